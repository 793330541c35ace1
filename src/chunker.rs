//! The two chunking strategies used by the pipeline.
//!
//! [`chunk_markdown`] is heading-aware: it packs whole blocks (see
//! [`crate::blocks`]) up to a character target, tracks the enclosing
//! heading stack so every chunk carries its section path, and carries a
//! trailing-character overlap into the next chunk. [`chunk_paragraphs`]
//! is the plain greedy variant used for HTML-derived plaintext, where
//! there are no headings worth tracking.
//!
//! Both are pure functions of their inputs: same text and parameters,
//! same chunks.

use crate::blocks::{BlockKind, split_blocks};

/// Default character target per chunk (roughly 1024 tokens).
pub const DEFAULT_TARGET_CHARS: usize = 6000;

/// Default character overlap between adjacent chunks (~10%).
pub const DEFAULT_OVERLAP: usize = 600;

/// A chunk produced by the heading-aware chunker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownChunk {
    pub text: String,
    /// Enclosing heading titles, most general first.
    pub section_path: Vec<String>,
    /// Character offset of the chunk start in the source text.
    pub offset_char: usize,
    /// Zero-based chunk index within the document.
    pub index: usize,
}

/// The trailing `n` characters of `s` (whole string if shorter).
fn char_suffix(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let count = s.chars().count();
    if n >= count {
        return s;
    }
    match s.char_indices().nth(count - n) {
        Some((byte_idx, _)) => &s[byte_idx..],
        None => "",
    }
}

/// Heading-aware greedy chunker.
///
/// Whole blocks are accumulated until adding the next one would push the
/// running length past `target_chars`; the buffer is then emitted and the
/// trailing `overlap` characters of the emitted text seed the next chunk.
/// A heading additionally forces an early emit once the buffer is at 80%
/// of the target, so sections tend to start fresh chunks. A single block
/// larger than the target is still emitted whole; fenced code is one
/// block and therefore never split.
pub fn chunk_markdown(
    text: &str,
    target_chars: usize,
    overlap: usize,
) -> Vec<MarkdownChunk> {
    let mut chunks: Vec<MarkdownChunk> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    let mut current_offset = 0usize;
    let mut section_stack: Vec<(usize, String)> = Vec::new();

    fn emit(
        chunks: &mut Vec<MarkdownChunk>,
        buffer: &str,
        stack: &[(usize, String)],
        offset: usize,
    ) -> Option<String> {
        let text = buffer.trim();
        if text.is_empty() {
            return None;
        }
        let text = text.to_string();
        chunks.push(MarkdownChunk {
            text: text.clone(),
            section_path: stack.iter().map(|(_, t)| t.clone()).collect(),
            offset_char: offset,
            index: chunks.len(),
        });
        Some(text)
    }

    for block in split_blocks(text) {
        let block_len = block.text.chars().count();

        if let BlockKind::Heading { level, title } = &block.kind {
            // Emit before updating the stack so the closed chunk keeps
            // the path of the content it actually holds.
            if current_len * 10 >= target_chars * 8 && !current.is_empty() {
                emit(&mut chunks, &current, &section_stack, current_offset);
                current.clear();
                current.push_str(&block.text);
                current_len = block_len;
                current_offset = block.offset;
            } else {
                if current.is_empty() {
                    current_offset = block.offset;
                }
                current.push_str(&block.text);
                current_len += block_len;
            }

            while section_stack
                .last()
                .is_some_and(|(depth, _)| *depth >= *level)
            {
                section_stack.pop();
            }
            section_stack.push((*level, title.clone()));
            continue;
        }

        if current.is_empty() {
            current_offset = block.offset;
        }

        if current_len + block_len > target_chars && !current.is_empty() {
            let emitted =
                emit(&mut chunks, &current, &section_stack, current_offset);
            let tail = match &emitted {
                Some(text) => char_suffix(text, overlap).to_string(),
                None => String::new(),
            };
            current_offset =
                block.offset.saturating_sub(tail.chars().count());
            current_len = tail.chars().count() + block_len;
            current = tail;
            // The tail comes from trimmed text; restore the line break
            // so the overlap and the new block do not glue together.
            if !current.is_empty() && !current.ends_with('\n') {
                current.push('\n');
                current_len += 1;
            }
            current.push_str(&block.text);
        } else {
            current.push_str(&block.text);
            current_len += block_len;
        }
    }

    emit(&mut chunks, &current, &section_stack, current_offset);
    chunks
}

/// Plain greedy paragraph chunker for text without heading structure.
///
/// Splits on blank lines, packs paragraphs until the budget would be
/// exceeded, then flushes and seeds the next buffer with the trailing
/// `overlap` characters of the flushed text. A paragraph longer than the
/// budget is placed alone rather than dropped.
pub fn chunk_paragraphs(
    text: &str,
    max_chars: usize,
    overlap: usize,
) -> Vec<String> {
    let paragraphs = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let mut out = Vec::new();
    let mut buf: Vec<String> = Vec::new();
    let mut len = 0usize;

    for para in paragraphs {
        let para_len = para.chars().count();
        if len + para_len + 2 <= max_chars || buf.is_empty() {
            buf.push(para.to_string());
            len += para_len + 2;
        } else {
            let joined = buf.join("\n\n");
            let tail = char_suffix(&joined, overlap).to_string();
            out.push(joined);
            len = tail.chars().count() + 2 + para_len;
            buf = vec![tail, para.to_string()];
        }
    }

    if !buf.is_empty() {
        out.push(buf.join("\n\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// True when `next` begins with some non-empty suffix of `prev` no
    /// longer than `overlap` characters.
    fn overlap_holds(prev: &str, next: &str, overlap: usize) -> bool {
        for n in (1..=overlap.min(prev.chars().count())).rev() {
            let suffix = char_suffix(prev, n);
            if next.starts_with(suffix) {
                return true;
            }
        }
        false
    }

    #[test]
    fn short_document_single_chunk() {
        let chunks = chunk_markdown("just a small paragraph\n", 1000, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "just a small paragraph");
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].offset_char, 0);
        assert!(chunks[0].section_path.is_empty());
    }

    #[test]
    fn heading_stack_pop_semantics() {
        let md = "# A\n\ncontent sitting under section a, long enough\n\n\
                  ## B\n\ncontent sitting under b, also long enough here\n\n\
                  ## C\n\ncontent sitting under c, also long enough here\n\n\
                  # D\n\ncontent sitting under d, also long enough here\n";
        // Paragraphs exceed 80% of the target, so every heading starts
        // a fresh chunk and each section lands in its own chunk.
        let chunks = chunk_markdown(md, 40, 0);

        let find = |needle: &str| {
            chunks
                .iter()
                .find(|c| c.text.contains(needle))
                .unwrap_or_else(|| panic!("no chunk containing {needle}"))
        };

        assert_eq!(find("under section a").section_path, vec!["A"]);
        assert_eq!(find("under b").section_path, vec!["A", "B"]);
        assert_eq!(find("under c").section_path, vec!["A", "C"]);
        assert_eq!(find("under d").section_path, vec!["D"]);
    }

    #[test]
    fn oversized_block_stays_whole() {
        let big = "x".repeat(500);
        let md = format!("small one\n\n{big}\n\nsmall two\n");
        let chunks = chunk_markdown(&md, 100, 0);

        let holding: Vec<_> =
            chunks.iter().filter(|c| c.text.contains(&big)).collect();
        assert_eq!(holding.len(), 1, "oversized block split or duplicated");
    }

    #[test]
    fn fenced_code_never_split() {
        let code = format!("```\n{}\n```", "let line = 0;\n".repeat(30));
        let md = format!("intro paragraph\n\n{code}\n\noutro\n");
        let chunks = chunk_markdown(&md, 120, 0);

        let holding: Vec<_> = chunks
            .iter()
            .filter(|c| c.text.contains("let line = 0;"))
            .collect();
        assert_eq!(holding.len(), 1);
        let fenced = holding[0];
        assert_eq!(fenced.text.matches("```").count(), 2);
    }

    #[test]
    fn overlap_is_suffix_of_previous() {
        let md: String = (0..40)
            .map(|i| format!("paragraph number {i} with some padding text\n\n"))
            .collect();
        let overlap = 50;
        let chunks = chunk_markdown(&md, 300, overlap);
        assert!(chunks.len() >= 2);

        for pair in chunks.windows(2) {
            assert!(
                overlap_holds(&pair[0].text, &pair[1].text, overlap),
                "chunk {} does not start with a suffix of its predecessor",
                pair[1].index
            );
        }
    }

    #[test]
    fn zero_overlap_chunks_share_nothing() {
        let md: String = (0..10)
            .map(|i| {
                format!("unique paragraph marker {i} with padding text\n\n")
            })
            .collect();
        let chunks = chunk_markdown(&md, 120, 0);
        assert!(chunks.len() >= 2);

        let all: String = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        for i in 0..10 {
            let marker = format!("unique paragraph marker {i}");
            assert_eq!(
                all.matches(&marker).count(),
                1,
                "paragraph {i} duplicated across chunks"
            );
        }
    }

    #[test]
    fn non_blank_lines_survive_chunking() {
        let md: String = (0..30)
            .map(|i| format!("line {i} of the source document\n\n"))
            .collect();
        let chunks = chunk_markdown(&md, 200, 40);
        let all: String = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        for line in md.lines().filter(|l| !l.trim().is_empty()) {
            assert!(all.contains(line), "lost line: {line}");
        }
    }

    #[test]
    fn deterministic() {
        let md = "# H\n\npara\n\n```\ncode\n```\n\nmore\n";
        assert_eq!(chunk_markdown(md, 15, 5), chunk_markdown(md, 15, 5));
    }

    #[test]
    fn end_to_end_three_paragraphs() {
        let md = "intro paragraph that sets the stage for everything\n\n\
                  ## Section\n\n\
                  body paragraph with a decent amount of text in it\n\n\
                  closing paragraph that wraps the whole thing up\n";
        let overlap = 20;
        let chunks = chunk_markdown(md, 80, overlap);

        assert!(chunks.len() >= 2);
        for c in chunks.iter().filter(|c| c.text.contains("body paragraph")) {
            assert_eq!(c.section_path, vec!["Section"]);
        }
        // The second chunk starts with the configured-length suffix of
        // the first (or a shorter one if trimming ate whitespace).
        assert!(overlap_holds(&chunks[0].text, &chunks[1].text, overlap));
    }

    #[test]
    fn paragraph_chunker_packs_greedily() {
        let text = "aaaa\n\nbbbb\n\ncccc\n\ndddd";
        let chunks = chunk_paragraphs(text, 14, 4);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0], "aaaa\n\nbbbb");
        // Next chunk is seeded with the 4-char tail of the previous.
        assert!(chunks[1].starts_with("bbbb"));
    }

    #[test]
    fn paragraph_chunker_keeps_oversized_paragraph() {
        let long = "z".repeat(300);
        let text = format!("short\n\n{long}\n\ntail");
        let chunks = chunk_paragraphs(&text, 100, 10);
        assert!(chunks.iter().any(|c| c.contains(&long)));
    }

    #[test]
    fn paragraph_chunker_empty_input() {
        assert!(chunk_paragraphs("", 100, 10).is_empty());
        assert!(chunk_paragraphs("\n\n  \n\n", 100, 10).is_empty());
    }

    #[test]
    fn char_suffix_multibyte_safe() {
        let s = "café ☕ 日本語";
        assert_eq!(char_suffix(s, 3), "日本語");
        assert_eq!(char_suffix(s, 100), s);
        assert_eq!(char_suffix(s, 0), "");
    }
}

//! Splits Markdown into atomic blocks for the heading-aware chunker.
//!
//! A block is a heading line, a whole fenced code region, or a run of
//! contiguous non-blank lines (a paragraph). Fenced code is never split:
//! everything from the opening ``` to the closing ``` is one block.
//! Offsets are in characters from the start of the input.

/// What a block is, as far as the chunker cares.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Paragraph,
    Heading { level: usize, title: String },
    CodeFence,
}

/// A contiguous block of source text with its own trailing newline(s).
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub text: String,
    /// Character offset of the block start in the full input.
    pub offset: usize,
    pub kind: BlockKind,
}

/// Parse an ATX heading line: `## Title` -> (2, "Title").
///
/// Leading whitespace disqualifies the line, matching CommonMark-ish
/// behavior close enough for converter output.
pub fn parse_heading(line: &str) -> Option<(usize, String)> {
    let trimmed = line.trim_end();
    let level = trimmed.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some((level, rest.trim().to_string()))
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Split Markdown text into ordered blocks.
///
/// Blank lines delimit paragraphs and are not part of any block, so
/// concatenating block texts drops blank lines but preserves every
/// non-blank line of the input.
pub fn split_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut buf = String::new();
    let mut buf_start = 0usize;
    let mut buf_kind = BlockKind::Paragraph;
    let mut offset = 0usize;
    let mut in_fence = false;

    fn flush(
        blocks: &mut Vec<Block>,
        buf: &mut String,
        start: usize,
        kind: &BlockKind,
    ) {
        if !buf.is_empty() {
            blocks.push(Block {
                text: std::mem::take(buf),
                offset: start,
                kind: kind.clone(),
            });
        }
    }

    for line in text.split_inclusive('\n') {
        let line_chars = line.chars().count();

        if is_fence(line) {
            if !in_fence {
                flush(&mut blocks, &mut buf, buf_start, &buf_kind);
                in_fence = true;
                buf_start = offset;
                buf_kind = BlockKind::CodeFence;
                buf.push_str(line);
            } else {
                buf.push_str(line);
                in_fence = false;
                flush(&mut blocks, &mut buf, buf_start, &buf_kind);
                buf_kind = BlockKind::Paragraph;
            }
            offset += line_chars;
            continue;
        }

        if in_fence {
            buf.push_str(line);
            offset += line_chars;
            continue;
        }

        if line.trim().is_empty() {
            flush(&mut blocks, &mut buf, buf_start, &buf_kind);
            offset += line_chars;
            buf_start = offset;
            continue;
        }

        if let Some((level, title)) = parse_heading(line) {
            flush(&mut blocks, &mut buf, buf_start, &buf_kind);
            blocks.push(Block {
                text: line.to_string(),
                offset,
                kind: BlockKind::Heading { level, title },
            });
            offset += line_chars;
            buf_start = offset;
            continue;
        }

        if buf.is_empty() {
            buf_start = offset;
            buf_kind = BlockKind::Paragraph;
        }
        buf.push_str(line);
        offset += line_chars;
    }

    flush(&mut blocks, &mut buf, buf_start, &buf_kind);
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let blocks = split_blocks("first para\nstill first\n\nsecond para\n");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "first para\nstill first\n");
        assert_eq!(blocks[0].offset, 0);
        assert_eq!(blocks[1].text, "second para\n");
        assert_eq!(blocks[1].offset, blocks[0].text.chars().count() + 1);
    }

    #[test]
    fn headings_are_their_own_blocks() {
        let blocks = split_blocks("# Title\nbody line\n");
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks[0].kind,
            BlockKind::Heading {
                level: 1,
                title: "Title".into()
            }
        );
        assert_eq!(blocks[1].kind, BlockKind::Paragraph);
    }

    #[test]
    fn fenced_code_is_one_block() {
        let md = "before\n\n```\nlet x = 1;\n\nlet y = 2;\n```\n\nafter\n";
        let blocks = split_blocks(md);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].kind, BlockKind::CodeFence);
        assert!(blocks[1].text.contains("let x = 1;"));
        assert!(blocks[1].text.contains("let y = 2;"));
        assert!(blocks[1].text.starts_with("```"));
        assert!(blocks[1].text.trim_end().ends_with("```"));
    }

    #[test]
    fn unclosed_fence_flushes_at_eof() {
        let blocks = split_blocks("```\ncode without closing fence\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::CodeFence);
    }

    #[test]
    fn heading_inside_fence_is_not_a_heading() {
        let blocks = split_blocks("```\n# not a heading\n```\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::CodeFence);
    }

    #[test]
    fn parse_heading_levels() {
        assert_eq!(parse_heading("# A"), Some((1, "A".into())));
        assert_eq!(parse_heading("### Deep  "), Some((3, "Deep".into())));
        assert_eq!(parse_heading("####### too deep"), None);
        assert_eq!(parse_heading("#nospace"), None);
        assert_eq!(parse_heading("plain"), None);
    }

    #[test]
    fn non_blank_lines_preserved() {
        let md = "# A\n\npara one\nline two\n\n```\ncode\n```\n\ntail\n";
        let joined: String =
            split_blocks(md).iter().map(|b| b.text.as_str()).collect();
        for line in md.lines().filter(|l| !l.trim().is_empty()) {
            assert!(joined.contains(line), "missing line: {line}");
        }
    }
}

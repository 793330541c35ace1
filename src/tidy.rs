//! In-place cleanup of a chunk file: conversion-artifact removal,
//! whitespace normalization, and re-folding of ORCA input blocks that
//! OCR flattened onto one long line.
//!
//! The recognized markers live in declarative tables so new artifacts
//! and ORCA keywords can be added without touching the pass itself.
//! The rewrite goes through a temp file and an atomic rename; a
//! timestamped backup of the original is taken first unless disabled.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;

use crate::{
    error::{Error, Result},
    record::ChunkRecord,
};

/// Whole lines matching any of these are conversion artifacts and are
/// dropped.
const ARTIFACT_LINES: &[&str] = &[
    r"(?i)^\s*<!--\s*image\s*-->\s*$",
    r"(?i)^\s*<!--\s*formula-not-decoded\s*-->\s*$",
    r"(?i)^(continues on next page|continued from previous page)\b.*",
];

/// (pattern, replacement) pairs applied to the whole text, in order.
/// First entry collapses stray symbols the OCR leaves behind (open box,
/// hooked arrow, rightwards arrow, zero-width space, no-break space).
const REPLACEMENTS: &[(&str, &str)] = &[
    (r"[\u{2423}\u{21AA}\u{2192}\u{200B}\u{00A0}]+", " "),
    (r"\s{2,}", " "),
];

/// ORCA keywords and section markers that should start a line. Extend
/// this table as more flattened inputs show up in converted manuals.
const ORCA_BREAK_MARKERS: &[&str] = &[
    r"%[A-Za-z][A-Za-z0-9_]*",
    r"end\b",
    r"\*\s+xyz\b",
    r"VeryTightSCF",
    r"TightSCF",
    r"RIJCOSX",
    r"PAL\d*\b",
    r"def2-[A-Za-z0-9\-]+",
    r"def2/[A-Za-z0-9\-]+",
    r"NROOTS",
    r"DTol",
];

/// A single flattened line has to be at least this long before the
/// reformatter considers it a mangled input block.
const FLAT_LINE_MIN_CHARS: usize = 120;

static ARTIFACT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ARTIFACT_LINES
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

static REPLACEMENT_RES: LazyLock<Vec<(Regex, &'static str)>> =
    LazyLock::new(|| {
        REPLACEMENTS
            .iter()
            .map(|(p, r)| (Regex::new(p).unwrap(), *r))
            .collect()
    });

static ORCA_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = ORCA_BREAK_MARKERS.join("|");
    Regex::new(&format!(r"(?i)\s+({alternatives})")).unwrap()
});

static BANG_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!(.+?)\s+").unwrap());

static LINE_EDGE_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*\n[ \t]*").unwrap());

static NEWLINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").unwrap());

/// Heuristic: does this look like an ORCA input that lost its line
/// breaks? A single long line starting with `!`, or containing a `%`
/// parameter section or a `* xyz` geometry marker.
pub fn looks_like_orca_flat(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() {
        return false;
    }
    let lowered = s.to_lowercase();
    let has_bang = s.starts_with('!');
    let has_pct = s.contains('%');
    let has_geom = lowered.contains("* xyz") || lowered.starts_with("*xyz");
    let long_single_line =
        !s.contains('\n') && s.chars().count() > FLAT_LINE_MIN_CHARS;
    (has_bang || has_pct || has_geom) && long_single_line
}

/// Re-fold a flattened ORCA input block by inserting line breaks before
/// recognized markers.
pub fn reformat_orca_text(s: &str) -> String {
    let mut s = s.trim().to_string();
    s = ORCA_BREAK.replace_all(&s, "\n${1}").into_owned();
    // Geometry block close: a bare `*` between tokens.
    s = s.replace(" * ", "\n* ");
    if s.starts_with('!') {
        s = BANG_HEAD.replace(&s, "!${1}\n").into_owned();
    }
    // Keep the result free of whitespace runs so the cleanup pass
    // converges after one application.
    s = LINE_EDGE_SPACE.replace_all(&s, "\n").into_owned();
    s = NEWLINE_RUNS.replace_all(&s, "\n").into_owned();
    s.trim().to_string()
}

/// Clean one record's text: drop artifact lines, collapse stray symbols
/// and whitespace runs, then re-fold flattened ORCA input if detected.
/// Idempotent: a second application is a no-op.
pub fn clean_text(text: &str) -> String {
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| !ARTIFACT_RES.iter().any(|re| re.is_match(line)))
        .collect();
    let mut s = kept.join("\n");

    for (re, replacement) in REPLACEMENT_RES.iter() {
        s = re.replace_all(&s, *replacement).into_owned();
    }

    if looks_like_orca_flat(&s) {
        s = reformat_orca_text(&s);
    }
    s.trim().to_string()
}

/// Outcome of a tidy run over a chunk file.
#[derive(Debug, Clone, Copy, Default)]
pub struct TidyStats {
    /// Lines read, including unparseable ones.
    pub total: usize,
    /// Records whose text changed.
    pub changed: usize,
    /// Malformed JSON lines that were dropped.
    pub skipped: usize,
}

fn backup_path(chunks: &Path) -> PathBuf {
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    chunks.with_extension(format!("jsonl.bak_{ts}"))
}

/// Rewrite a chunk file in place, cleaning every record's text.
///
/// The cleaned file is written next to the original and swapped in with
/// a rename, so a crash mid-run leaves either the original (or its
/// backup) or a complete temp file, never a half-written target. With
/// `backup` the original is renamed to `<name>.jsonl.bak_<timestamp>`
/// before the swap and read from there.
pub fn process_chunks(chunks_path: &Path, backup: bool) -> Result<TidyStats> {
    if !chunks_path.exists() {
        return Err(Error::NotFound {
            kind: "chunk file",
            name: chunks_path.display().to_string(),
        });
    }

    let tmp_path = chunks_path.with_extension("jsonl.tmp");

    let input_path = if backup {
        let bak = backup_path(chunks_path);
        std::fs::rename(chunks_path, &bak)?;
        bak
    } else {
        chunks_path.to_path_buf()
    };

    let mut stats = TidyStats::default();
    {
        let reader = BufReader::new(File::open(&input_path)?);
        let mut out = BufWriter::new(File::create(&tmp_path)?);

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            stats.total += 1;

            let mut rec: ChunkRecord = match serde_json::from_str(&line) {
                Ok(rec) => rec,
                Err(err) => {
                    stats.skipped += 1;
                    tracing::debug!(%err, "skipping malformed chunk line");
                    continue;
                }
            };

            let cleaned = clean_text(&rec.text);
            if cleaned != rec.text {
                stats.changed += 1;
                rec.text = cleaned;
            }
            serde_json::to_writer(&mut out, &rec)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
    }

    std::fs::rename(&tmp_path, chunks_path)?;
    Ok(stats)
}

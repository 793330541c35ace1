//! Turns converted documents into chunk files.
//!
//! Two entry points: [`chunk_markdown_file`] runs the heading-aware
//! chunker over a single Markdown document, and [`chunk_directory`]
//! walks a directory of `*.md`/`*.html` files, chunking Markdown with
//! the plain paragraph packer and reducing HTML to text first. HTML
//! files additionally contribute figure records.
//!
//! An existing output file is rotated to `.jsonl.bak` before writing,
//! so a rerun never silently appends to stale output.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{
    chunker::{chunk_markdown, chunk_paragraphs},
    error::{Error, Result},
    html::{harvest_figures, html_to_text},
    record::{ChunkMeta, ChunkRecord, ChunkWriter, FIGURE_KIND},
};

fn chunk_id(doc: &str, index: usize) -> String {
    format!("{doc}_{index:05}")
}

fn figure_id(doc: &str, index: usize) -> String {
    format!("{doc}_fig_{index:05}")
}

fn rotate_existing(out: &Path) -> Result<()> {
    if out.exists() {
        let bak = out.with_extension("jsonl.bak");
        std::fs::rename(out, &bak)?;
        tracing::info!(backup = %bak.display(), "rotated existing output");
    }
    Ok(())
}

/// Chunk one Markdown document with the heading-aware chunker and
/// write the records to `out`. Returns the number of records written.
pub fn chunk_markdown_file(
    input: &Path,
    doc_name: &str,
    target_chars: usize,
    overlap: usize,
    out: &Path,
) -> Result<usize> {
    if !input.exists() {
        return Err(Error::NotFound {
            kind: "input file",
            name: input.display().to_string(),
        });
    }
    let text = std::fs::read_to_string(input)?;
    let chunks = chunk_markdown(&text, target_chars, overlap);

    rotate_existing(out)?;
    let mut writer = ChunkWriter::create(out)?;
    for chunk in &chunks {
        writer.write(&ChunkRecord {
            id: chunk_id(doc_name, chunk.index),
            text: chunk.text.clone(),
            meta: ChunkMeta {
                doc: doc_name.to_string(),
                section_path: (!chunk.section_path.is_empty())
                    .then(|| chunk.section_path.clone()),
                offset_char: Some(chunk.offset_char),
                chunk_index: Some(chunk.index),
                source_path: Some(input.display().to_string()),
                ..Default::default()
            },
        })?;
    }
    let written = writer.written();
    writer.finish()?;
    tracing::info!(doc = doc_name, chunks = written, "chunked");
    Ok(written)
}

fn collect_sources(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_sources(&path, found)?;
        } else if path.extension().is_some_and(|ext| {
            ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("html")
        }) {
            found.push(path);
        }
    }
    Ok(())
}

/// Document name for a source file: the parent directory name for
/// files nested below the walk root (exported HTML lands as one
/// directory per chapter), the file stem at the root itself.
fn doc_name_of(path: &Path, root: &Path) -> String {
    let nested = path.parent().is_some_and(|parent| parent != root);
    let name = if nested {
        path.parent().and_then(|parent| parent.file_name())
    } else {
        path.file_stem()
    };
    name.map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

fn figure_text(caption: &str, asset: Option<&str>) -> String {
    let mut text = if caption.is_empty() {
        "Figure".to_string()
    } else {
        format!("Figure: {caption}")
    };
    if let Some(asset) = asset {
        text.push_str(&format!("\nAsset: {asset}"));
    }
    text
}

/// Chunk every `*.md` and `*.html` file under `src` (recursively,
/// sorted by path) into one chunk file at `out`.
///
/// With `assets`, figure image paths are resolved against that
/// directory. Returns the number of records written.
pub fn chunk_directory(
    src: &Path,
    out: &Path,
    assets: Option<&Path>,
    max_chars: usize,
    overlap: usize,
) -> Result<usize> {
    if !src.is_dir() {
        return Err(Error::NotFound {
            kind: "source directory",
            name: src.display().to_string(),
        });
    }

    let mut sources = Vec::new();
    collect_sources(src, &mut sources)?;
    sources.sort();

    rotate_existing(out)?;
    let mut writer = ChunkWriter::create(out)?;

    // Counters keyed by document name so ids stay unique when several
    // files map onto the same document. Figures number independently.
    let mut text_counts: HashMap<String, usize> = HashMap::new();
    let mut figure_counts: HashMap<String, usize> = HashMap::new();

    for source in &sources {
        let doc = doc_name_of(source, src);
        let raw = std::fs::read_to_string(source)?;
        let is_html = source
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));

        let text = if is_html { html_to_text(&raw) } else { raw.clone() };

        for chunk in chunk_paragraphs(&text, max_chars, overlap) {
            let index = text_counts.entry(doc.clone()).or_insert(0);
            writer.write(&ChunkRecord {
                id: chunk_id(&doc, *index),
                text: chunk,
                meta: ChunkMeta {
                    doc: doc.clone(),
                    chunk_index: Some(*index),
                    source_path: Some(source.display().to_string()),
                    ..Default::default()
                },
            })?;
            *index += 1;
        }

        if is_html {
            for figure in harvest_figures(&raw) {
                let asset_path = figure.src.as_ref().map(|src| {
                    match assets {
                        Some(dir) => dir.join(src).display().to_string(),
                        None => src.clone(),
                    }
                });
                let index = figure_counts.entry(doc.clone()).or_insert(0);
                writer.write(&ChunkRecord {
                    id: figure_id(&doc, *index),
                    text: figure_text(
                        &figure.caption,
                        asset_path.as_deref(),
                    ),
                    meta: ChunkMeta {
                        doc: doc.clone(),
                        chunk_index: Some(*index),
                        source_path: Some(source.display().to_string()),
                        kind: Some(FIGURE_KIND.to_string()),
                        asset_path,
                        ..Default::default()
                    },
                })?;
                *index += 1;
            }
        }
    }

    let written = writer.written();
    writer.finish()?;
    tracing::info!(
        files = sources.len(),
        records = written,
        "directory chunked"
    );
    Ok(written)
}

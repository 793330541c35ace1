//! The JSONL chunk file format shared by every pipeline stage.
//!
//! Each line is one independently-parseable JSON object:
//! `{"id": "...", "text": "...", "meta": {...}}`. Order in the file
//! reflects document order; records are never mutated after creation
//! except by the tidy pass, which rewrites `text` in place.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Marker value for `meta.type` on figure records.
pub const FIGURE_KIND: &str = "figure";

/// One retrieval unit: a text span (or figure reference) with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Document-scoped identifier, e.g. `manual_00042`.
    pub id: String,
    pub text: String,
    pub meta: ChunkMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Originating document name.
    pub doc: String,
    /// Enclosing heading titles, most general first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_path: Option<Vec<String>>,
    /// Character offset of the chunk start in the source text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_char: Option<usize>,
    /// Zero-based chunk index within the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    /// Path of the converted source file this record came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    /// Record kind marker; currently only `"figure"`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Resolved path of the figure image asset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_path: Option<String>,
}

impl ChunkRecord {
    /// Display title for retrieval output: the section path joined with
    /// " / ", falling back to the document name.
    pub fn title(&self) -> String {
        match &self.meta.section_path {
            Some(path) if !path.is_empty() => path.join(" / "),
            _ => self.meta.doc.clone(),
        }
    }

    pub fn is_figure(&self) -> bool {
        self.meta.kind.as_deref() == Some(FIGURE_KIND)
    }
}

/// Append-only writer for a chunk file.
pub struct ChunkWriter {
    inner: BufWriter<File>,
    written: usize,
}

impl ChunkWriter {
    /// Create (truncate) a chunk file at `path`, creating parent
    /// directories as needed.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            inner: BufWriter::new(File::create(path)?),
            written: 0,
        })
    }

    pub fn write(&mut self, record: &ChunkRecord) -> Result<()> {
        serde_json::to_writer(&mut self.inner, record)?;
        self.inner.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn finish(mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Read a whole chunk file into memory.
///
/// Fails on the first malformed line; stages that must tolerate bad
/// lines (the tidy pass) stream the file themselves.
pub fn read_chunk_file(path: &Path) -> Result<Vec<ChunkRecord>> {
    if !path.exists() {
        return Err(Error::NotFound {
            kind: "chunk file",
            name: path.display().to_string(),
        });
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChunkRecord {
        ChunkRecord {
            id: "doc_00000".into(),
            text: "Some text.".into(),
            meta: ChunkMeta {
                doc: "doc".into(),
                section_path: Some(vec!["A".into(), "B".into()]),
                offset_char: Some(0),
                chunk_index: Some(0),
                ..Default::default()
            },
        }
    }

    #[test]
    fn roundtrip_through_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chunks.jsonl");

        let mut writer = ChunkWriter::create(&path).unwrap();
        writer.write(&sample()).unwrap();
        assert_eq!(writer.written(), 1);
        writer.finish().unwrap();

        let records = read_chunk_file(&path).unwrap();
        assert_eq!(records, vec![sample()]);
    }

    #[test]
    fn optional_meta_fields_are_omitted() {
        let rec = ChunkRecord {
            id: "x".into(),
            text: "t".into(),
            meta: ChunkMeta {
                doc: "d".into(),
                ..Default::default()
            },
        };
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"id":"x","text":"t","meta":{"doc":"d"}}"#);
    }

    #[test]
    fn figure_kind_serializes_as_type() {
        let rec = ChunkRecord {
            id: "x".into(),
            text: "Figure: cap".into(),
            meta: ChunkMeta {
                doc: "d".into(),
                kind: Some(FIGURE_KIND.into()),
                asset_path: Some("assets/x.png".into()),
                ..Default::default()
            },
        };
        assert!(rec.is_figure());
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains(r#""type":"figure""#));
    }

    #[test]
    fn title_prefers_section_path() {
        assert_eq!(sample().title(), "A / B");

        let mut rec = sample();
        rec.meta.section_path = None;
        assert_eq!(rec.title(), "doc");
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = read_chunk_file(Path::new("/nonexistent/chunks.jsonl"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}

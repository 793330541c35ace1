//! ragmill - a PDF-to-RAG pipeline for document manuals.
//!
//! ragmill converts PDF manuals to Markdown, chunks them into a JSONL
//! chunk file, cleans conversion artifacts, embeds the chunks via
//! [Ollama](https://ollama.com) into a local [redb] vector index, and
//! answers questions grounded in the retrieved passages.
//!
//! # Quick start
//!
//! ```no_run
//! use ragmill::{DataDir, VectorDb};
//! use ragmill::chunker::chunk_markdown;
//!
//! let chunks = chunk_markdown("# Intro\n\nSome manual text.\n", 6000, 600);
//! for c in &chunks {
//!     println!("{} {:?}", c.index, c.section_path);
//! }
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let db = VectorDb::open(&data_dir.index_db()).unwrap();
//! assert!(db.is_empty().unwrap());
//! ```

pub mod blocks;
pub mod chat;
pub mod chunker;
pub mod cli;
pub mod concat;
pub mod convert;
pub mod data_dir;
pub mod error;
pub mod html;
pub mod indexer;
pub mod ingest;
pub mod ollama;
pub mod query;
pub mod record;
pub mod split;
pub mod tidy;
pub mod vector_db;

pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use ollama::OllamaClient;
pub use record::{ChunkMeta, ChunkRecord};
pub use vector_db::VectorDb;

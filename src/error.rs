use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("PDF text extraction error: {0}")]
    PdfExtract(#[from] pdf_extract::OutputError),

    #[error("invalid Ollama URL: {0}")]
    OllamaUrl(#[from] url::ParseError),

    #[error("Ollama request failed: {0}")]
    Ollama(#[from] ollama_rs::error::OllamaError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("external tool failed: {0}")]
    Tool(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}

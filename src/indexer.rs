//! Builds the vector index from a chunk file.

use std::path::Path;

use crate::{
    error::{Error, Result},
    ollama::OllamaClient,
    record::read_chunk_file,
    vector_db::VectorDb,
};

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Embed every record in `chunks_path` and persist records and vectors
/// to `db`. Records are keyed by their position in the file, so
/// re-indexing the same file overwrites in place. The embedding model
/// name is stored in the index settings.
///
/// Returns the number of records indexed.
pub async fn index_chunks(
    client: &OllamaClient,
    db: &VectorDb,
    chunks_path: &Path,
    embed_model: &str,
    batch_size: usize,
) -> Result<usize> {
    if batch_size == 0 {
        return Err(Error::Config(
            "batch size must be at least 1".to_string(),
        ));
    }
    let records = read_chunk_file(chunks_path)?;
    let total = records.len();

    let mut next_id = 0u64;
    for batch in records.chunks(batch_size) {
        let texts: Vec<String> =
            batch.iter().map(|r| r.text.clone()).collect();
        let vectors = client.embed_batch(embed_model, &texts).await?;
        if vectors.len() != batch.len() {
            return Err(Error::Config(format!(
                "embedding server returned {} vectors for {} inputs",
                vectors.len(),
                batch.len()
            )));
        }

        let entries: Vec<_> = batch
            .iter()
            .zip(vectors)
            .map(|(record, vector)| {
                let entry = (next_id, record.clone(), vector);
                next_id += 1;
                entry
            })
            .collect();
        db.upsert_batch(&entries)?;
        tracing::debug!(indexed = next_id, total, "batch stored");
    }

    db.set_embed_model(embed_model)?;
    tracing::info!(records = total, model = embed_model, "index built");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_chunk_file_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let client = OllamaClient::from_url(None).unwrap();
        let db = VectorDb::open(&tmp.path().join("index.redb")).unwrap();

        let err = index_chunks(
            &client,
            &db,
            Path::new("/nonexistent/chunks.jsonl"),
            "nomic-embed-text",
            DEFAULT_BATCH_SIZE,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn zero_batch_size_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let client = OllamaClient::from_url(None).unwrap();
        let db = VectorDb::open(&tmp.path().join("index.redb")).unwrap();
        let chunks = tmp.path().join("chunks.jsonl");
        std::fs::write(&chunks, "").unwrap();

        let err = index_chunks(&client, &db, &chunks, "m", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn empty_chunk_file_indexes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let client = OllamaClient::from_url(None).unwrap();
        let db = VectorDb::open(&tmp.path().join("index.redb")).unwrap();
        let chunks = tmp.path().join("chunks.jsonl");
        std::fs::write(&chunks, "").unwrap();

        // No records means no embedding calls, so this works offline.
        let n = index_chunks(&client, &db, &chunks, "m", 8).await.unwrap();
        assert_eq!(n, 0);
        assert!(db.is_empty().unwrap());
    }
}

//! The on-disk vector index: chunk records plus their embeddings.
//!
//! One redb database with three tables:
//! - `records`: numeric chunk ID -> JSON-encoded [`ChunkRecord`]
//! - `vectors`: numeric chunk ID -> 4-byte dimension header (u32 LE)
//!   followed by f32 LE values
//! - `settings`: string key/value pairs, currently the embedding model
//!   name the index was built with
//!
//! Vectors are L2-normalized on insert, so cosine similarity at query
//! time is a plain dot product.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{
    error::{Error, Result},
    record::ChunkRecord,
};

const RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("records");
const VECTORS: TableDefinition<u64, &[u8]> = TableDefinition::new("vectors");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// Dimension header size in bytes.
const HEADER_SIZE: usize = 4;

const EMBED_MODEL_KEY: &str = "embed_model";

/// A retrieval hit: one stored record with its similarity score.
#[derive(Debug, Clone)]
pub struct Hit {
    pub id: u64,
    pub score: f32,
    pub record: ChunkRecord,
}

pub struct VectorDb {
    db: Database,
}

fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn decode_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() < HEADER_SIZE {
        return None;
    }
    let dim =
        u32::from_le_bytes(bytes[0..4].try_into().ok()?) as usize;
    if bytes.len() != HEADER_SIZE + dim * 4 {
        return None;
    }
    Some(bytemuck::cast_slice(&bytes[HEADER_SIZE..]).to_vec())
}

impl VectorDb {
    /// Open or create an index database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(RECORDS)?;
        txn.open_table(VECTORS)?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Store a batch of records with their embeddings in one
    /// transaction. Vectors are normalized before storage.
    pub fn upsert_batch(
        &self,
        entries: &[(u64, ChunkRecord, Vec<f32>)],
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write()?;
        {
            let mut records = txn.open_table(RECORDS)?;
            let mut vectors = txn.open_table(VECTORS)?;
            for (id, record, vector) in entries {
                let json = serde_json::to_vec(record)?;
                records.insert(*id, json.as_slice())?;

                let mut vector = vector.clone();
                normalize(&mut vector);
                let dim = vector.len() as u32;
                let byte_len = HEADER_SIZE + vector.len() * 4;
                let mut guard = vectors.insert_reserve(*id, byte_len)?;
                let dest = guard.as_mut();
                dest[0..4].copy_from_slice(&dim.to_le_bytes());
                dest[HEADER_SIZE..]
                    .copy_from_slice(bytemuck::cast_slice(&vector));
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        let mut count = 0usize;
        for entry in table.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Record the embedding model this index was built with.
    pub fn set_embed_model(&self, model: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(EMBED_MODEL_KEY, model)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn embed_model(&self) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table
            .get(EMBED_MODEL_KEY)?
            .map(|guard| guard.value().to_string()))
    }

    /// The `k` most similar stored records by cosine similarity.
    ///
    /// A full scan over the vectors table; fine for a manual-sized
    /// index.
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
        let mut query = query.to_vec();
        normalize(&mut query);

        let txn = self.db.begin_read()?;
        let vectors = txn.open_table(VECTORS)?;
        let records = txn.open_table(RECORDS)?;

        let mut hits: Vec<(u64, f32)> = Vec::new();
        for entry in vectors.iter()? {
            let (key, value) = entry?;
            let id = key.value();
            let Some(vector) = decode_vector(value.value()) else {
                continue;
            };
            if vector.len() != query.len() {
                return Err(Error::Config(format!(
                    "embedding dimension mismatch: index has {}, query \
                     has {}",
                    vector.len(),
                    query.len()
                )));
            }
            hits.push((id, dot(&query, &vector)));
        }

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        let mut out = Vec::with_capacity(hits.len());
        for (id, score) in hits {
            let Some(guard) = records.get(id)? else {
                continue;
            };
            let record: ChunkRecord = serde_json::from_slice(guard.value())?;
            out.push(Hit { id, score, record });
        }
        Ok(out)
    }
}

impl std::fmt::Debug for VectorDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorDb").finish_non_exhaustive()
    }
}

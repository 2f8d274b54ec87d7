//! Chunk embedding storage and brute-force similarity search.
//!
//! Vectors are stored per (content hash, chunk sequence) as little-endian
//! f32 BLOBs. Search is an exhaustive cosine scan over every stored
//! vector joined to its owning active documents — O(N·D), an accepted
//! design limit for on-device corpora.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::models::{VectorHit, VIRTUAL_SCHEME};
use crate::store::Store;

/// A content hash awaiting embedding, with its body and a representative
/// path for progress display.
#[derive(Debug, Clone)]
pub struct PendingContent {
    pub hash: String,
    pub body: String,
    pub path: String,
}

impl Store {
    /// Store one chunk embedding. Idempotent replace keyed by (hash, seq).
    pub async fn insert_embedding(
        &self,
        hash: &str,
        seq: i64,
        pos: i64,
        vector: &[f32],
        model: &str,
        embedded_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO chunk_vectors (hash, seq, pos, model, embedded_at, embedding)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(hash)
        .bind(seq)
        .bind(pos)
        .bind(model)
        .bind(embedded_at.to_rfc3339())
        .bind(vec_to_blob(vector))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Store every chunk embedding for one hash in a single transaction:
    /// either all (hash, seq) rows land or none do. Pending detection
    /// keys off the seq-0 row, so a partial flush would make a
    /// half-embedded hash look complete forever.
    pub async fn insert_embeddings(
        &self,
        hash: &str,
        chunks: &[(usize, Vec<f32>)],
        model: &str,
        embedded_at: DateTime<Utc>,
    ) -> Result<()> {
        let dims = chunks.first().map(|(_, v)| v.len()).unwrap_or(0);
        let mut tx = self.pool().begin().await?;
        for (seq, (pos, vector)) in chunks.iter().enumerate() {
            if vector.len() != dims {
                bail!(
                    "mixed embedding dims for {}: {} vs {}",
                    hash,
                    vector.len(),
                    dims
                );
            }
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO chunk_vectors (hash, seq, pos, model, embedded_at, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(hash)
            .bind(seq as i64)
            .bind(*pos as i64)
            .bind(model)
            .bind(embedded_at.to_rfc3339())
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Remove all stored embeddings (force a re-embed).
    pub async fn clear_embeddings(&self) -> Result<()> {
        sqlx::query("DELETE FROM chunk_vectors")
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Remove embeddings whose hash has no active document. Returns the
    /// number of chunk rows removed.
    pub async fn delete_orphaned_vectors(&self) -> Result<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM chunk_vectors
            WHERE hash NOT IN (SELECT DISTINCT hash FROM documents WHERE active = 1)
            "#,
        )
        .execute(self.pool())
        .await?;
        Ok(res.rows_affected())
    }

    /// Content hashes from active documents that have no embedding yet
    /// (detected by the absence of a seq-0 row).
    pub async fn hashes_needing_embedding(&self) -> Result<Vec<PendingContent>> {
        let rows = sqlx::query(
            r#"
            SELECT d.hash, c.body, MIN(d.path) AS path
            FROM documents d
            JOIN content c ON c.hash = d.hash
            LEFT JOIN chunk_vectors v ON v.hash = d.hash AND v.seq = 0
            WHERE d.active = 1 AND v.hash IS NULL
            GROUP BY d.hash
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| PendingContent {
                hash: row.get("hash"),
                body: row.get("body"),
                path: row.get("path"),
            })
            .collect())
    }

    /// How many active content hashes still have no embedding. Cheaper
    /// than materializing the bodies when only the number is wanted.
    pub async fn count_hashes_needing_embedding(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT d.hash)
            FROM documents d
            LEFT JOIN chunk_vectors v ON v.hash = d.hash AND v.seq = 0
            WHERE d.active = 1 AND v.hash IS NULL
            "#,
        )
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }

    /// Brute-force cosine similarity over every stored vector, joined to
    /// its owning active document(s), sorted descending and truncated to
    /// `limit` (0 = unlimited).
    pub async fn search_vectors_brute(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        let rows = sqlx::query(
            r#"
            SELECT cv.embedding,
                   ? || d.collection || '/' || d.path AS filepath,
                   d.collection || '/' || d.path AS display_path,
                   d.title, c.body, d.hash
            FROM chunk_vectors cv
            JOIN documents d ON d.hash = cv.hash AND d.active = 1
            JOIN content c ON c.hash = d.hash
            "#,
        )
        .bind(VIRTUAL_SCHEME)
        .fetch_all(self.pool())
        .await?;

        let mut hits: Vec<VectorHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                VectorHit {
                    filepath: row.get("filepath"),
                    display_path: row.get("display_path"),
                    title: row.get("title"),
                    body: row.get("body"),
                    hash: row.get("hash"),
                    score: cosine_similarity(query_vector, &vector),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if limit > 0 {
            hits.truncate(limit);
        }
        Ok(hits)
    }
}

/// Encode a float vector as little-endian f32 bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in [-1, 1]. Returns 0.0 for empty or
/// mismatched-length vectors, or when either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

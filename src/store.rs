//! The durable index: a [`Store`] over one SQLite database.
//!
//! This module owns the content-addressable blob store and the read-side
//! listing/status queries. Document lifecycle lives in
//! [`crate::registry`], embeddings in [`crate::vectors`], and lexical
//! search in [`crate::search`] — all as `impl Store` blocks, so the
//! `Store` handle is the only way to touch the index.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::{CollectionStatus, DocEntry, Status, VIRTUAL_SCHEME};

/// Handle to the index database. Cheap to clone; all mutation goes
/// through its methods.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    db_path: PathBuf,
}

/// Hex SHA-256 of a document body. Identical bodies anywhere share one
/// content row.
pub fn hash_body(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Store {
    /// Open the store at the configured database path, creating the
    /// schema if needed.
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.db.path).await
    }

    /// Open the store at an explicit database path.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = db::connect(db_path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    // ============ Content store ============

    /// Insert a content blob. Idempotent: an existing hash is left as is.
    pub async fn put_content(
        &self,
        hash: &str,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO content (hash, body, created_at) VALUES (?, ?, ?)")
            .bind(hash)
            .bind(body)
            .bind(created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Fetch a content blob by hash.
    pub async fn get_content(&self, hash: &str) -> Result<String> {
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM content WHERE hash = ?")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        body.ok_or_else(|| anyhow!("content not found: {}", hash))
    }

    /// Delete content rows whose hash has no active document. Cascades to
    /// tombstoned document rows referencing the same hash. Returns the
    /// number of content rows removed.
    pub async fn delete_unreferenced_content(&self) -> Result<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM content
            WHERE hash NOT IN (SELECT DISTINCT hash FROM documents WHERE active = 1)
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    // ============ Listing and status ============

    /// All active documents with virtual path, display path, and body length.
    pub async fn list_documents(&self) -> Result<Vec<DocEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT
                ? || d.collection || '/' || d.path AS filepath,
                d.collection || '/' || d.path AS display_path,
                LENGTH(c.body) AS body_len,
                d.collection,
                d.path
            FROM documents d
            JOIN content c ON c.hash = d.hash
            WHERE d.active = 1
            ORDER BY d.collection, d.path
            "#,
        )
        .bind(VIRTUAL_SCHEME)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DocEntry {
                filepath: row.get("filepath"),
                display_path: row.get("display_path"),
                body_len: row.get("body_len"),
                collection: row.get("collection"),
                path: row.get("path"),
            })
            .collect())
    }

    /// Document body by (collection, path), with optional line slicing.
    /// `from_line` is 1-based; `max_lines = 0` means all lines.
    pub async fn get_document_body(
        &self,
        collection: &str,
        path: &str,
        from_line: usize,
        max_lines: usize,
    ) -> Result<String> {
        let body: Option<String> = sqlx::query_scalar(
            r#"
            SELECT c.body
            FROM documents d
            JOIN content c ON c.hash = d.hash
            WHERE d.collection = ? AND d.path = ? AND d.active = 1
            "#,
        )
        .bind(collection)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        let body =
            body.ok_or_else(|| anyhow!("document not found: {}/{}", collection, path))?;
        if from_line > 0 || max_lines > 0 {
            Ok(slice_lines(&body, from_line, max_lines))
        } else {
            Ok(body)
        }
    }

    /// Document count, vector count, and per-collection stats.
    pub async fn status(&self) -> Result<Status> {
        let doc_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE active = 1")
                .fetch_one(&self.pool)
                .await?;
        let vector_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
            .fetch_one(&self.pool)
            .await?;
        let pending_embeddings = self.count_hashes_needing_embedding().await?;

        let rows = sqlx::query(
            r#"
            SELECT collection, COUNT(*) AS cnt, MAX(modified_at) AS last_modified
            FROM documents WHERE active = 1
            GROUP BY collection
            ORDER BY collection
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let collections = rows
            .iter()
            .map(|row| CollectionStatus {
                name: row.get("collection"),
                active_count: row.get("cnt"),
                last_modified: row.get("last_modified"),
            })
            .collect();

        Ok(Status {
            doc_count,
            vector_count,
            pending_embeddings,
            collections,
        })
    }
}

fn slice_lines(text: &str, from_line: usize, max_lines: usize) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let start = if from_line > 0 {
        if from_line > lines.len() {
            return String::new();
        }
        from_line - 1
    } else {
        0
    };
    let mut slice = &lines[start..];
    if max_lines > 0 && slice.len() > max_lines {
        slice = &slice[..max_lines];
    }
    slice.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(tmp: &TempDir) -> Store {
        Store::open(&tmp.path().join("index.sqlite")).await.unwrap()
    }

    #[test]
    fn hash_is_stable_sha256() {
        assert_eq!(
            hash_body(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(hash_body("a"), hash_body("a"));
        assert_ne!(hash_body("a"), hash_body("b"));
    }

    #[test]
    fn slice_lines_window() {
        let text = "one\ntwo\nthree\nfour";
        assert_eq!(slice_lines(text, 2, 2), "two\nthree");
        assert_eq!(slice_lines(text, 0, 1), "one");
        assert_eq!(slice_lines(text, 10, 0), "");
        assert_eq!(slice_lines(text, 1, 0), text);
    }

    #[tokio::test]
    async fn put_content_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        let now = Utc::now();

        let hash = hash_body("hello");
        store.put_content(&hash, "hello", now).await.unwrap();
        store.put_content(&hash, "hello", now).await.unwrap();

        assert_eq!(store.get_content(&hash).await.unwrap(), "hello");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn get_content_missing_is_error() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        assert!(store.get_content("deadbeef").await.is_err());
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.sqlite");
        let store = Store::open(&path).await.unwrap();
        store.close().await;
        // Second open re-runs migrations against the existing schema.
        let store = Store::open(&path).await.unwrap();
        assert_eq!(store.status().await.unwrap().doc_count, 0);
    }
}

//! Document lifecycle: upsert, deactivate, lookups.
//!
//! Every mutation updates the `documents_fts` projection inside the same
//! transaction as the `documents` row, so a document and its lexical
//! projection always appear both-old or both-new — there is no trigger
//! machinery and no window where they can diverge. These methods are the
//! only way to mutate the projection.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, Transaction};

use crate::models::Document;
use crate::store::Store;

/// What an upsert did to the (collection, path) slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No active row existed; a new document was created.
    Inserted,
    /// An active row existed with a different hash; updated in place.
    Updated,
    /// The active row already carries this hash; nothing written.
    Unchanged,
}

impl Store {
    /// Insert or update the active document at (collection, path).
    ///
    /// Content for `hash` must already be in the content store. A
    /// matching hash is a no-op: file modification time never drives
    /// change detection, only content does.
    pub async fn upsert_document(
        &self,
        collection: &str,
        path: &str,
        title: &str,
        hash: &str,
        modified_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        match self.find_active_document(collection, path).await? {
            Some(doc) if doc.hash == hash => Ok(UpsertOutcome::Unchanged),
            Some(doc) => {
                let mut tx = self.pool().begin().await?;
                sqlx::query("UPDATE documents SET title = ?, hash = ?, modified_at = ? WHERE id = ?")
                    .bind(title)
                    .bind(hash)
                    .bind(modified_at.to_rfc3339())
                    .bind(doc.id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM documents_fts WHERE rowid = ?")
                    .bind(doc.id)
                    .execute(&mut *tx)
                    .await?;
                insert_fts_row(&mut tx, doc.id, collection, path, title, hash).await?;
                tx.commit().await?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let mut tx = self.pool().begin().await?;
                let now = Utc::now();
                let res = sqlx::query(
                    r#"
                    INSERT INTO documents (collection, path, title, hash, created_at, modified_at, active)
                    VALUES (?, ?, ?, ?, ?, ?, 1)
                    "#,
                )
                .bind(collection)
                .bind(path)
                .bind(title)
                .bind(hash)
                .bind(now.to_rfc3339())
                .bind(modified_at.to_rfc3339())
                .execute(&mut *tx)
                .await?;
                let id = res.last_insert_rowid();
                insert_fts_row(&mut tx, id, collection, path, title, hash).await?;
                tx.commit().await?;
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    /// Tombstone the active document at (collection, path), removing its
    /// lexical projection in the same transaction. Returns whether an
    /// active row existed.
    pub async fn deactivate_document(&self, collection: &str, path: &str) -> Result<bool> {
        let Some(doc) = self.find_active_document(collection, path).await? else {
            return Ok(false);
        };
        let mut tx = self.pool().begin().await?;
        sqlx::query("UPDATE documents SET active = 0 WHERE id = ?")
            .bind(doc.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents_fts WHERE rowid = ?")
            .bind(doc.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    pub async fn find_active_document(
        &self,
        collection: &str,
        path: &str,
    ) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT id, collection, path, title, hash, created_at, modified_at, active
            FROM documents
            WHERE collection = ? AND path = ? AND active = 1
            "#,
        )
        .bind(collection)
        .bind(path)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| document_from_row(&r)))
    }

    /// Relative paths of all active documents in a collection.
    pub async fn list_active_paths(&self, collection: &str) -> Result<Vec<String>> {
        let paths = sqlx::query_scalar(
            "SELECT path FROM documents WHERE collection = ? AND active = 1",
        )
        .bind(collection)
        .fetch_all(self.pool())
        .await?;
        Ok(paths)
    }

    /// First active document whose hash starts with `prefix`. A leading
    /// `#` is stripped. An ambiguous prefix resolves to an arbitrary
    /// match, not an error; an empty prefix matches nothing.
    pub async fn find_by_hash_prefix(&self, prefix: &str) -> Result<Option<Document>> {
        let prefix = prefix.trim().trim_start_matches('#');
        if prefix.is_empty() {
            return Ok(None);
        }
        let row = sqlx::query(
            r#"
            SELECT id, collection, path, title, hash, created_at, modified_at, active
            FROM documents
            WHERE hash LIKE ? AND active = 1
            LIMIT 1
            "#,
        )
        .bind(format!("{}%", prefix))
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| document_from_row(&r)))
    }
}

/// Materialize the lexical projection row for a document. Runs inside the
/// caller's transaction; the content row must exist.
async fn insert_fts_row(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    collection: &str,
    path: &str,
    title: &str,
    hash: &str,
) -> Result<()> {
    let body: String = sqlx::query_scalar("SELECT body FROM content WHERE hash = ?")
        .bind(hash)
        .fetch_one(&mut **tx)
        .await?;
    sqlx::query("INSERT INTO documents_fts (rowid, filepath, title, body) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(format!("{}/{}", collection, path))
        .bind(title)
        .bind(body)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Document {
    let active: i64 = row.get("active");
    Document {
        id: row.get("id"),
        collection: row.get("collection"),
        path: row.get("path"),
        title: row.get("title"),
        hash: row.get("hash"),
        created_at: parse_ts(&row.get::<String, _>("created_at")),
        modified_at: parse_ts(&row.get::<String, _>("modified_at")),
        active: active == 1,
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{hash_body, Store};
    use tempfile::TempDir;

    async fn open_store(tmp: &TempDir) -> Store {
        Store::open(&tmp.path().join("index.sqlite")).await.unwrap()
    }

    async fn put_doc(store: &Store, collection: &str, path: &str, body: &str) -> UpsertOutcome {
        let now = Utc::now();
        let hash = hash_body(body);
        store.put_content(&hash, body, now).await.unwrap();
        store
            .upsert_document(collection, path, path, &hash, now)
            .await
            .unwrap()
    }

    async fn fts_count(store: &Store) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM documents_fts")
            .fetch_one(store.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_then_unchanged_then_update() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        assert_eq!(
            put_doc(&store, "notes", "a.md", "first body").await,
            UpsertOutcome::Inserted
        );
        assert_eq!(
            put_doc(&store, "notes", "a.md", "first body").await,
            UpsertOutcome::Unchanged
        );
        assert_eq!(
            put_doc(&store, "notes", "a.md", "second body").await,
            UpsertOutcome::Updated
        );

        // Updated in place: still a single document row at this slot.
        let doc = store
            .find_active_document("notes", "a.md")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.hash, hash_body("second body"));
        assert_eq!(fts_count(&store).await, 1);
    }

    #[tokio::test]
    async fn deactivate_removes_projection_and_keeps_tombstone() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        put_doc(&store, "notes", "a.md", "body").await;

        assert!(store.deactivate_document("notes", "a.md").await.unwrap());
        assert_eq!(fts_count(&store).await, 0);
        assert!(store
            .find_active_document("notes", "a.md")
            .await
            .unwrap()
            .is_none());

        // Tombstone, not a physical delete.
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(total, 1);

        // Deactivating again is a no-op.
        assert!(!store.deactivate_document("notes", "a.md").await.unwrap());
    }

    #[tokio::test]
    async fn shared_hash_survives_single_deactivation() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        put_doc(&store, "notes", "a.md", "same body").await;
        put_doc(&store, "work", "b.md", "same body").await;

        // One blob for two documents.
        let blobs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(blobs, 1);

        store.deactivate_document("notes", "a.md").await.unwrap();
        assert_eq!(store.delete_unreferenced_content().await.unwrap(), 0);
        assert!(store
            .get_content(&hash_body("same body"))
            .await
            .is_ok());

        store.deactivate_document("work", "b.md").await.unwrap();
        assert_eq!(store.delete_unreferenced_content().await.unwrap(), 1);
        assert!(store.get_content(&hash_body("same body")).await.is_err());
    }

    #[tokio::test]
    async fn hash_prefix_lookup() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        put_doc(&store, "notes", "a.md", "prefix lookup body").await;

        let hash = hash_body("prefix lookup body");
        let doc = store
            .find_by_hash_prefix(&format!("#{}", &hash[..6]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.path, "a.md");

        assert!(store.find_by_hash_prefix("").await.unwrap().is_none());
        assert!(store.find_by_hash_prefix("ffffff").await.unwrap().is_none()
            || hash.starts_with("ffffff"));
    }

    #[tokio::test]
    async fn list_active_paths_excludes_tombstones() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        put_doc(&store, "notes", "a.md", "a").await;
        put_doc(&store, "notes", "b.md", "b").await;
        put_doc(&store, "work", "c.md", "c").await;
        store.deactivate_document("notes", "b.md").await.unwrap();

        let mut paths = store.list_active_paths("notes").await.unwrap();
        paths.sort();
        assert_eq!(paths, vec!["a.md".to_string()]);
    }
}

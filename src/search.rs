//! Lexical search over the FTS5 projection of active documents.
//!
//! Query terms are sanitized to lowercase alphanumerics (plus apostrophe)
//! and matched as AND-ed prefixes. Raw BM25 relevance (lower magnitude =
//! more relevant in FTS5) is pushed through a sigmoid so lexical scores
//! land in 0..1, magnitude-comparable with cosine similarity.

use anyhow::Result;
use sqlx::Row;

use crate::models::{LexicalHit, VIRTUAL_SCHEME};
use crate::store::Store;

/// Sigmoid center: |bm25| at which the normalized score is 0.5.
const BM25_CENTER: f64 = 5.0;
/// Sigmoid scale: how quickly scores saturate around the center.
const BM25_SCALE: f64 = 3.0;

/// Strip a query term down to lowercase ASCII alphanumerics and
/// apostrophes. Everything else is dropped.
pub fn sanitize_term(term: &str) -> String {
    term.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '\'')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Build an FTS5 MATCH expression: every surviving term as a quoted
/// prefix, AND-ed together. `None` when no terms survive sanitization.
pub fn build_match_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(sanitize_term)
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"*", t))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" AND "))
    }
}

/// Map raw BM25 relevance to 0..1, higher is better.
pub fn normalize_bm25(raw: f64) -> f64 {
    1.0 / (1.0 + (-(raw.abs() - BM25_CENTER) / BM25_SCALE).exp())
}

impl Store {
    /// Lexical search over active documents. An empty (or fully
    /// sanitized-away) query returns no results rather than an error.
    /// `limit = 0` means unlimited; `collection` optionally restricts
    /// the partition searched.
    pub async fn search_lexical(
        &self,
        query: &str,
        limit: usize,
        collection: Option<&str>,
    ) -> Result<Vec<LexicalHit>> {
        let Some(match_query) = build_match_query(query) else {
            return Ok(Vec::new());
        };

        let mut sql = String::from(
            r#"
            SELECT ?1 || d.collection || '/' || d.path AS filepath,
                   d.collection || '/' || d.path AS display_path,
                   d.title, c.body, d.hash, d.collection,
                   bm25(documents_fts, 10.0, 1.0) AS rank
            FROM documents_fts f
            JOIN documents d ON d.id = f.rowid
            JOIN content c ON c.hash = d.hash
            WHERE documents_fts MATCH ?2 AND d.active = 1
            "#,
        );
        if collection.is_some() {
            sql.push_str(" AND d.collection = ?4");
        }
        sql.push_str(" ORDER BY rank ASC LIMIT ?3");

        let mut q = sqlx::query(&sql)
            .bind(VIRTUAL_SCHEME)
            .bind(&match_query)
            .bind(if limit == 0 { -1 } else { limit as i64 });
        if let Some(name) = collection {
            q = q.bind(name);
        }
        let rows = q.fetch_all(self.pool()).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let rank: f64 = row.get("rank");
                LexicalHit {
                    filepath: row.get("filepath"),
                    display_path: row.get("display_path"),
                    title: row.get("title"),
                    body: row.get("body"),
                    hash: row.get("hash"),
                    collection: row.get("collection"),
                    score: normalize_bm25(rank),
                }
            })
            .collect())
    }
}

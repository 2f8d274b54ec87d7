//! Core data types and virtual addressing.
//!
//! Documents are externally addressed as `quarry://collection/path`; that
//! form is also the join key when fusing lexical and vector result lists.

use chrono::{DateTime, Utc};

/// URI scheme for virtual document paths.
pub const VIRTUAL_SCHEME: &str = "quarry://";

/// Length of a short docid: a hash prefix long enough to be unambiguous
/// for on-device corpora.
pub const SHORT_DOCID_LEN: usize = 6;

/// A registered document: one (collection, path) slot pointing at a
/// content hash. `active = false` is a tombstone, not a deletion.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: i64,
    pub collection: String,
    pub path: String,
    pub title: String,
    pub hash: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub active: bool,
}

/// A listing entry for an active document.
#[derive(Debug, Clone)]
pub struct DocEntry {
    pub filepath: String,
    pub display_path: String,
    pub body_len: i64,
    pub collection: String,
    pub path: String,
}

/// One lexical (FTS5/BM25) search hit.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub filepath: String,
    pub display_path: String,
    pub title: String,
    pub body: String,
    pub hash: String,
    pub collection: String,
    /// Normalized 0..1, higher is better.
    pub score: f64,
}

/// One vector search hit.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub filepath: String,
    pub display_path: String,
    pub title: String,
    pub body: String,
    pub hash: String,
    /// Cosine similarity in [-1, 1].
    pub score: f64,
}

/// Index status for the `status` command.
#[derive(Debug, Clone)]
pub struct Status {
    pub doc_count: i64,
    pub vector_count: i64,
    /// Active content hashes with no stored embedding yet.
    pub pending_embeddings: i64,
    pub collections: Vec<CollectionStatus>,
}

/// Per-collection stats.
#[derive(Debug, Clone)]
pub struct CollectionStatus {
    pub name: String,
    pub active_count: i64,
    pub last_modified: Option<String>,
}

/// Format the fully-qualified virtual path for a document.
pub fn virtual_path(collection: &str, path: &str) -> String {
    format!("{}{}/{}", VIRTUAL_SCHEME, collection, path)
}

/// Parse a `quarry://collection/path` address into its parts.
/// Returns `None` for anything that is not a well-formed virtual path.
pub fn parse_virtual_path(vpath: &str) -> Option<(&str, &str)> {
    let rest = vpath.strip_prefix(VIRTUAL_SCHEME)?;
    let idx = rest.find('/')?;
    Some((&rest[..idx], &rest[idx + 1..]))
}

/// Short docid for display: the first hex characters of a content hash.
pub fn short_docid(hash: &str) -> &str {
    &hash[..SHORT_DOCID_LEN.min(hash.len())]
}

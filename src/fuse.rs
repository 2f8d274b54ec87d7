//! Reciprocal Rank Fusion of lexical and vector result lists.
//!
//! RRF depends only on rank positions, so the two underlying score
//! scales need no calibration: an item at 0-based rank `r` in a list
//! contributes `1 / (k + r + 1)`, and items appearing in both lists sum
//! their contributions. Lists are joined on the virtual path.

use std::collections::HashMap;

use crate::models::{LexicalHit, VectorHit};

/// Standard RRF constant.
pub const RRF_K: f64 = 60.0;

/// How deep to fetch each candidate list before fusing.
pub fn fetch_limit(limit: usize) -> usize {
    (limit * 4).max(20)
}

/// One fused hit with its accumulated RRF score.
#[derive(Debug, Clone)]
pub struct FusedHit {
    pub filepath: String,
    pub display_path: String,
    pub title: String,
    pub body: String,
    pub hash: String,
    pub score: f64,
}

/// Merge two already-ranked lists by virtual path, sort by fused score
/// descending, and truncate to `limit` (0 = unlimited). Ties keep an
/// arbitrary order.
pub fn reciprocal_rank_fusion(
    lexical: &[LexicalHit],
    vector: &[VectorHit],
    k: f64,
    limit: usize,
) -> Vec<FusedHit> {
    let mut fused: HashMap<&str, FusedHit> = HashMap::new();

    for (rank, hit) in lexical.iter().enumerate() {
        let rrf = 1.0 / (k + rank as f64 + 1.0);
        fused
            .entry(hit.filepath.as_str())
            .and_modify(|f| f.score += rrf)
            .or_insert_with(|| FusedHit {
                filepath: hit.filepath.clone(),
                display_path: hit.display_path.clone(),
                title: hit.title.clone(),
                body: hit.body.clone(),
                hash: hit.hash.clone(),
                score: rrf,
            });
    }

    for (rank, hit) in vector.iter().enumerate() {
        let rrf = 1.0 / (k + rank as f64 + 1.0);
        fused
            .entry(hit.filepath.as_str())
            .and_modify(|f| f.score += rrf)
            .or_insert_with(|| FusedHit {
                filepath: hit.filepath.clone(),
                display_path: hit.display_path.clone(),
                title: hit.title.clone(),
                body: hit.body.clone(),
                hash: hit.hash.clone(),
                score: rrf,
            });
    }

    let mut out: Vec<FusedHit> = fused.into_values().collect();
    out.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if limit > 0 {
        out.truncate(limit);
    }
    out
}

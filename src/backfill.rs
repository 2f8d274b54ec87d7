//! Embedding backfill: chunk and embed every active content hash that
//! has no stored vectors yet.
//!
//! A hash becomes query-visible only once all of its chunk vectors are
//! written: chunks are embedded into memory first and flushed together,
//! so a backend failure mid-document never leaves a half-embedded hash
//! behind. Failures are counted and the batch continues.

use anyhow::Result;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::chunker::chunk_text;
use crate::config::Config;
use crate::embedder::Embedder;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::store::Store;

/// Counters from one backfill pass.
#[derive(Debug, Clone, Default)]
pub struct BackfillReport {
    /// Content hashes that needed embedding.
    pub pending: u64,
    /// Hashes fully embedded this pass.
    pub embedded: u64,
    /// Chunk vectors written.
    pub chunks_written: u64,
    /// Hashes skipped because a chunk embedding failed.
    pub failed: u64,
}

/// Embed all pending content. `rebuild` clears every stored vector
/// first; `limit` caps how many hashes are processed this pass.
pub async fn run_backfill(
    store: &Store,
    config: &Config,
    embedder: &dyn Embedder,
    rebuild: bool,
    limit: Option<usize>,
    cancel: &AtomicBool,
    progress: &dyn ProgressReporter,
) -> Result<BackfillReport> {
    if rebuild {
        store.clear_embeddings().await?;
    }

    let mut pending = store.hashes_needing_embedding().await?;
    if let Some(lim) = limit {
        pending.truncate(lim);
    }

    let mut report = BackfillReport {
        pending: pending.len() as u64,
        ..Default::default()
    };
    let total = pending.len() as u64;

    for (i, doc) in pending.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        progress.report(ProgressEvent::Embedding {
            n: i as u64 + 1,
            total,
        });

        let chunks = chunk_text(
            &doc.body,
            config.chunking.max_chars,
            config.chunking.overlap_chars,
        );

        // Embed every chunk before writing anything, so a hash is never
        // visible half-embedded.
        let mut vectors = Vec::with_capacity(chunks.len());
        let mut failed = false;
        for chunk in &chunks {
            match embedder.embed(&chunk.text).await {
                Ok(v) => vectors.push(v),
                Err(e) => {
                    eprintln!("warning: embedding failed for {}: {}", doc.path, e);
                    failed = true;
                    break;
                }
            }
        }
        if failed {
            report.failed += 1;
            continue;
        }

        // One transaction per hash: all seq rows land together, so a
        // crash mid-flush can never leave the seq-0 row masking an
        // incomplete set.
        let entries: Vec<(usize, Vec<f32>)> = chunks
            .iter()
            .map(|c| c.pos)
            .zip(vectors.into_iter())
            .collect();
        store
            .insert_embeddings(&doc.hash, &entries, embedder.model_name(), Utc::now())
            .await?;
        report.chunks_written += entries.len() as u64;
        report.embedded += 1;
    }

    Ok(report)
}

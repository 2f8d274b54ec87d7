//! File-system reconciliation: one discrete, re-runnable pass that
//! brings a collection partition of the index in line with the files
//! currently on disk.
//!
//! Change detection is by content hash only; modification times are
//! never consulted. Unreadable files are skipped with a warning and are
//! **not** treated as deleted — only a path that is genuinely absent
//! from the walk gets its document deactivated.

use anyhow::{bail, Result};
use chrono::Utc;
use globset::{Glob, GlobSetBuilder};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use walkdir::WalkDir;

use crate::config::Config;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::registry::UpsertOutcome;
use crate::store::{hash_body, Store};

/// Counters from one reconciliation pass over one collection.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub collection: String,
    pub indexed: u64,
    pub updated: u64,
    pub removed: u64,
    pub skipped: u64,
    pub blobs_reclaimed: u64,
    pub vectors_reclaimed: u64,
}

/// Reconcile every configured collection in name order.
pub async fn reconcile_all(
    store: &Store,
    config: &Config,
    cancel: &AtomicBool,
    progress: &dyn ProgressReporter,
) -> Result<Vec<ReconcileReport>> {
    let mut reports = Vec::new();
    for (name, collection) in &config.collections {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        reports.push(
            reconcile_collection(
                store,
                name,
                &collection.root,
                &collection.pattern,
                cancel,
                progress,
            )
            .await?,
        );
    }
    Ok(reports)
}

/// Reconcile one collection against the files under `root` matching
/// `pattern`.
///
/// Two consecutive runs over an unchanged tree leave the index
/// byte-identical. Cancellation stops promptly after the current file;
/// a cancelled run skips the deactivation and GC phases, since unseen
/// paths are then not evidence of deletion.
pub async fn reconcile_collection(
    store: &Store,
    name: &str,
    root: &Path,
    pattern: &str,
    cancel: &AtomicBool,
    progress: &dyn ProgressReporter,
) -> Result<ReconcileReport> {
    if !root.exists() {
        bail!("collection root does not exist: {}", root.display());
    }

    progress.report(ProgressEvent::Scanning {
        collection: name.to_string(),
    });
    let files = enumerate_files(root, pattern)?;

    let mut report = ReconcileReport {
        collection: name.to_string(),
        ..Default::default()
    };
    let mut seen: HashSet<String> = HashSet::with_capacity(files.len());
    let total = files.len() as u64;

    for (i, rel) in files.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return Ok(report);
        }
        progress.report(ProgressEvent::Indexing {
            collection: name.to_string(),
            n: i as u64 + 1,
            total,
        });

        // An unreadable path is not an absent path: count it as seen so
        // the deactivation phase leaves its document alone.
        seen.insert(rel.clone());

        match index_path(store, name, root, rel).await {
            Ok(UpsertOutcome::Inserted) => report.indexed += 1,
            Ok(UpsertOutcome::Updated) => report.updated += 1,
            Ok(UpsertOutcome::Unchanged) => {}
            Err(e) => {
                eprintln!("warning: skipping {}/{}: {}", name, rel, e);
                report.skipped += 1;
            }
        }
    }

    if cancel.load(Ordering::Relaxed) {
        return Ok(report);
    }

    // Paths active in the index but absent from this walk were deleted,
    // renamed, or excluded by the pattern.
    for path in store.list_active_paths(name).await? {
        if !seen.contains(&path) {
            match store.deactivate_document(name, &path).await {
                Ok(true) => report.removed += 1,
                Ok(false) => {}
                Err(e) => {
                    eprintln!("warning: failed to deactivate {}/{}: {}", name, path, e);
                    report.skipped += 1;
                }
            }
        }
    }

    report.blobs_reclaimed = store.delete_unreferenced_content().await?;
    report.vectors_reclaimed = store.delete_orphaned_vectors().await?;

    Ok(report)
}

async fn index_path(store: &Store, name: &str, root: &Path, rel: &str) -> Result<UpsertOutcome> {
    let body = std::fs::read_to_string(root.join(rel))?;
    let hash = hash_body(&body);

    if let Some(doc) = store.find_active_document(name, rel).await? {
        if doc.hash == hash {
            return Ok(UpsertOutcome::Unchanged);
        }
    }

    let now = Utc::now();
    let title = Path::new(rel)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| rel.to_string());
    store.put_content(&hash, &body, now).await?;
    store.upsert_document(name, rel, &title, &hash, now).await
}

/// Relative paths of all regular files under `root` matching `pattern`,
/// sorted for deterministic processing order.
fn enumerate_files(root: &Path, pattern: &str) -> Result<Vec<String>> {
    let mut builder = GlobSetBuilder::new();
    builder.add(Glob::new(pattern)?);
    let glob_set = builder.build()?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                eprintln!("warning: walk error under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_string();
        if glob_set.is_match(&rel) {
            files.push(rel);
        }
    }
    files.sort();
    Ok(files)
}

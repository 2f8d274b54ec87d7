//! # Quarry CLI
//!
//! The `quarry` binary drives the index: reconciliation, embedding
//! backfill, and the three query channels (lexical, vector, hybrid).
//!
//! ```bash
//! quarry --config ./quarry.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quarry init` | Create the SQLite database and schema |
//! | `quarry update [collection]` | Reconcile collections with the file system |
//! | `quarry search "<query>"` | Lexical (BM25) search |
//! | `quarry vsearch "<query>"` | Vector similarity search |
//! | `quarry query "<query>"` | Hybrid search (BM25 + vector, RRF) |
//! | `quarry embed` | Backfill missing chunk embeddings |
//! | `quarry get <target>` | Print a document by docid or path |
//! | `quarry ls` | List active documents |
//! | `quarry status` | Index status |

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use quarry::backfill::run_backfill;
use quarry::config::{load_config, Config};
use quarry::embedder::create_embedder;
use quarry::fuse::{fetch_limit, reciprocal_rank_fusion};
use quarry::models::{parse_virtual_path, short_docid};
use quarry::progress::ProgressMode;
use quarry::reconcile::{reconcile_all, reconcile_collection, ReconcileReport};
use quarry::store::Store;

/// Quarry — an on-device hybrid search engine for local document
/// collections.
#[derive(Parser)]
#[command(
    name = "quarry",
    about = "Quarry — on-device hybrid (keyword + semantic) search over local document collections",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./quarry.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Reconcile collections with the current file-system contents.
    ///
    /// Walks each collection's root for files matching its glob pattern,
    /// indexes new and changed files (by content hash), deactivates
    /// documents whose files are gone, and reclaims orphaned storage.
    Update {
        /// Reconcile only this collection.
        collection: Option<String>,

        /// Progress output: auto, off, human, json.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Lexical (BM25) search over active documents.
    Search {
        query: String,

        /// Number of results.
        #[arg(short = 'n', long = "limit", default_value_t = 0)]
        limit: usize,

        /// Restrict to one collection.
        #[arg(short = 'c', long)]
        collection: Option<String>,

        /// Minimum score threshold (defaults to retrieval.min_score).
        #[arg(long)]
        min_score: Option<f64>,
    },

    /// Vector similarity search over chunk embeddings.
    Vsearch {
        query: String,

        /// Number of results.
        #[arg(short = 'n', long = "limit", default_value_t = 0)]
        limit: usize,
    },

    /// Hybrid search: BM25 and vector results fused with RRF.
    ///
    /// Falls back to lexical-only when the embedding backend is
    /// disabled or unreachable.
    Query {
        query: String,

        /// Number of results.
        #[arg(short = 'n', long = "limit", default_value_t = 0)]
        limit: usize,

        /// Restrict the lexical channel to one collection.
        #[arg(short = 'c', long)]
        collection: Option<String>,

        /// Minimum fused score threshold (defaults to retrieval.min_score).
        #[arg(long)]
        min_score: Option<f64>,
    },

    /// Backfill chunk embeddings for content that has none yet.
    Embed {
        /// Clear all stored vectors first and re-embed everything.
        #[arg(long)]
        rebuild: bool,

        /// Maximum number of documents (content hashes) to process.
        #[arg(long)]
        limit: Option<usize>,

        /// Progress output: auto, off, human, json.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Print a document body.
    ///
    /// Target forms: short docid (`#a1b2c3`), virtual path
    /// (`quarry://collection/path`), or `collection/path`.
    Get {
        target: String,

        /// First line to print (1-based).
        #[arg(long, default_value_t = 0)]
        from: usize,

        /// Maximum number of lines to print (0 = all).
        #[arg(long, default_value_t = 0)]
        lines: usize,
    },

    /// List active documents.
    Ls,

    /// Show index status.
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = Store::connect(&config).await?;
            println!("initialized {}", store.db_path().display());
            store.close().await;
        }

        Commands::Update {
            collection,
            progress,
        } => {
            let store = Store::connect(&config).await?;
            let reporter = ProgressMode::from_flag(Some(progress.as_str())).reporter();
            let cancel = cancel_on_ctrl_c();

            let reports = match collection {
                Some(name) => {
                    let Some(cc) = config.collections.get(&name) else {
                        bail!("unknown collection: '{}'", name);
                    };
                    vec![
                        reconcile_collection(
                            &store,
                            &name,
                            &cc.root,
                            &cc.pattern,
                            &cancel,
                            reporter.as_ref(),
                        )
                        .await?,
                    ]
                }
                None => {
                    if config.collections.is_empty() {
                        bail!("no collections configured in {}", cli.config.display());
                    }
                    reconcile_all(&store, &config, &cancel, reporter.as_ref()).await?
                }
            };

            for report in &reports {
                print_reconcile_report(report);
            }
            store.close().await;
        }

        Commands::Search {
            query,
            limit,
            collection,
            min_score,
        } => {
            let store = Store::connect(&config).await?;
            let limit = effective_limit(limit, &config);
            let min_score = min_score.unwrap_or(config.retrieval.min_score);
            let hits = store
                .search_lexical(&query, limit, collection.as_deref())
                .await?;
            let rows: Vec<(f64, &str, &str, &str)> = hits
                .iter()
                .filter(|h| h.score >= min_score)
                .map(|h| {
                    (
                        h.score,
                        h.hash.as_str(),
                        h.display_path.as_str(),
                        h.body.as_str(),
                    )
                })
                .collect();
            print_hits(&rows);
            store.close().await;
        }

        Commands::Vsearch { query, limit } => {
            if !config.embedding.is_enabled() {
                bail!("vsearch requires embeddings. Set [embedding] provider in config.");
            }
            let store = Store::connect(&config).await?;
            let limit = effective_limit(limit, &config);
            let embedder = create_embedder(&config.embedding)?;
            let query_vec = embedder.embed(&query).await?;
            let hits = store.search_vectors_brute(&query_vec, limit).await?;
            let rows: Vec<(f64, &str, &str, &str)> = hits
                .iter()
                .map(|h| {
                    (
                        h.score,
                        h.hash.as_str(),
                        h.display_path.as_str(),
                        h.body.as_str(),
                    )
                })
                .collect();
            print_hits(&rows);
            store.close().await;
        }

        Commands::Query {
            query,
            limit,
            collection,
            min_score,
        } => {
            let store = Store::connect(&config).await?;
            let limit = effective_limit(limit, &config);
            let min_score = min_score.unwrap_or(config.retrieval.min_score);
            let fetch = fetch_limit(limit);

            let lexical = store
                .search_lexical(&query, fetch, collection.as_deref())
                .await?;

            // The vector channel is best-effort: a missing or failing
            // backend degrades the query to lexical-only.
            let mut vector = Vec::new();
            if config.embedding.is_enabled() {
                match create_embedder(&config.embedding) {
                    Ok(embedder) => match embedder.embed(&query).await {
                        Ok(query_vec) => {
                            vector = store.search_vectors_brute(&query_vec, fetch).await?;
                        }
                        Err(e) => {
                            eprintln!("warning: embedding backend unavailable, lexical-only: {}", e)
                        }
                    },
                    Err(e) => {
                        eprintln!("warning: embedding backend unavailable, lexical-only: {}", e)
                    }
                }
            }

            let fused = reciprocal_rank_fusion(&lexical, &vector, config.retrieval.rrf_k, limit);
            let rows: Vec<(f64, &str, &str, &str)> = fused
                .iter()
                .filter(|h| h.score >= min_score)
                .map(|h| {
                    (
                        h.score,
                        h.hash.as_str(),
                        h.display_path.as_str(),
                        h.body.as_str(),
                    )
                })
                .collect();
            print_hits(&rows);
            store.close().await;
        }

        Commands::Embed {
            rebuild,
            limit,
            progress,
        } => {
            if !config.embedding.is_enabled() {
                bail!("embed requires embeddings. Set [embedding] provider in config.");
            }
            let store = Store::connect(&config).await?;
            let reporter = ProgressMode::from_flag(Some(progress.as_str())).reporter();
            let cancel = cancel_on_ctrl_c();
            let embedder = create_embedder(&config.embedding)?;

            let report = run_backfill(
                &store,
                &config,
                embedder.as_ref(),
                rebuild,
                limit,
                &cancel,
                reporter.as_ref(),
            )
            .await?;
            println!(
                "embedded {} of {} pending documents ({} chunks, {} failed)",
                report.embedded, report.pending, report.chunks_written, report.failed
            );
            store.close().await;
        }

        Commands::Get {
            target,
            from,
            lines,
        } => {
            let store = Store::connect(&config).await?;
            let (collection, path) = resolve_target(&store, &target).await?;
            let body = store
                .get_document_body(&collection, &path, from, lines)
                .await?;
            println!("{}", body);
            store.close().await;
        }

        Commands::Ls => {
            let store = Store::connect(&config).await?;
            let docs = store.list_documents().await?;
            for doc in &docs {
                println!("{}\t{}", doc.display_path, doc.body_len);
            }
            store.close().await;
        }

        Commands::Status => {
            let store = Store::connect(&config).await?;
            let status = store.status().await?;
            println!("index: {}", store.db_path().display());
            println!("documents: {}", status.doc_count);
            println!("vectors: {}", status.vector_count);
            println!("pending embeddings: {}", status.pending_embeddings);
            for c in &status.collections {
                println!(
                    "  {}: {} active{}",
                    c.name,
                    c.active_count,
                    c.last_modified
                        .as_deref()
                        .map(|m| format!(", last modified {}", m))
                        .unwrap_or_default()
                );
            }
            store.close().await;
        }
    }

    Ok(())
}

fn effective_limit(flag: usize, config: &Config) -> usize {
    if flag > 0 {
        flag
    } else {
        config.retrieval.limit.max(1) as usize
    }
}

/// Resolve a `get` target to (collection, path): a virtual path, a
/// `collection/path` pair, or a short docid / hash prefix.
async fn resolve_target(store: &Store, target: &str) -> Result<(String, String)> {
    if let Some((collection, path)) = parse_virtual_path(target) {
        return Ok((collection.to_string(), path.to_string()));
    }
    if target.starts_with('#') || target.chars().all(|c| c.is_ascii_hexdigit()) {
        if let Some(doc) = store.find_by_hash_prefix(target).await? {
            return Ok((doc.collection, doc.path));
        }
    }
    if let Some(idx) = target.find('/') {
        return Ok((target[..idx].to_string(), target[idx + 1..].to_string()));
    }
    bail!("document not found: {}", target)
}

fn print_reconcile_report(report: &ReconcileReport) {
    let mut line = format!(
        "collection '{}': {} new, {} updated, {} removed",
        report.collection, report.indexed, report.updated, report.removed
    );
    if report.skipped > 0 {
        line.push_str(&format!(", {} skipped", report.skipped));
    }
    println!("{}", line);
}

fn print_hits(rows: &[(f64, &str, &str, &str)]) {
    if rows.is_empty() {
        println!("No results.");
        return;
    }
    for (i, (score, hash, display_path, body)) in rows.iter().enumerate() {
        println!("{}. [{:.2}] #{} {}", i + 1, score, short_docid(hash), display_path);
        println!("   {}", excerpt(body, 200));
    }
}

/// One-line excerpt, truncated at a character boundary.
fn excerpt(body: &str, max_chars: usize) -> String {
    let flat = body.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        flat.to_string()
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Flip a shared flag on Ctrl-C so long passes stop at the next file.
fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::Relaxed);
        }
    });
    cancel
}

//! # Quarry
//!
//! An on-device hybrid search engine for local document collections.
//!
//! Quarry keeps a durable SQLite index synchronized with named collections
//! of text files, and answers queries through three channels: lexical
//! (FTS5/BM25) search, brute-force vector similarity search over chunk
//! embeddings, and a fused hybrid ranking via Reciprocal Rank Fusion.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Collections │──▶│  Reconciler  │──▶│    SQLite     │
//! │ root + glob │   │ hash + diff  │   │ content/docs  │
//! └─────────────┘   └──────────────┘   │ FTS5 + vecs   │
//!                                      └──────┬────────┘
//!                   ┌──────────────┐          │
//!                   │ Chunk+Embed  │──────────┤
//!                   └──────────────┘          ▼
//!                                      ┌───────────────┐
//!                                      │ search/vsearch│
//!                                      │ query (RRF)   │
//!                                      └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! quarry init                    # create database
//! quarry update                  # reconcile all collections
//! quarry embed                   # generate chunk embeddings
//! quarry search "deployment"     # lexical search
//! quarry query "deployment"      # hybrid search (BM25 + vector, RRF)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and virtual addressing |
//! | [`store`] | Content-addressable store and index status |
//! | [`registry`] | Document lifecycle and the lexical projection |
//! | [`chunker`] | Boundary-aware overlapping text chunker |
//! | [`vectors`] | Chunk embedding storage and brute-force search |
//! | [`search`] | Lexical (FTS5/BM25) search |
//! | [`fuse`] | Reciprocal Rank Fusion of lexical and vector results |
//! | [`reconcile`] | File-system reconciliation |
//! | [`embedder`] | Embedding backend abstraction |
//! | [`backfill`] | Embedding backfill over pending content |

pub mod backfill;
pub mod chunker;
pub mod config;
pub mod db;
pub mod embedder;
pub mod fuse;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod reconcile;
pub mod registry;
pub mod search;
pub mod store;
pub mod vectors;

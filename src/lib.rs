//! # Quarry
//!
//! A local retrieval-augmented generation engine: ingest text and PDF
//! documents, index their chunks as vectors, and answer questions from the
//! most relevant chunks with the sources attached.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Loaders  │──▶│ Chunk+Embed  │──▶│  FileStore   │
//! │ text/PDF  │   │ (batched)    │   │ index.json   │
//! └───────────┘   └──────────────┘   └──────┬───────┘
//!                                           │ search(k)
//!                                           ▼
//!        question ──embed──▶ ┌───────────────────────┐ ──▶ answer + sources
//!                            │ QueryPipeline + prompt │
//!                            └───────────────────────┘
//! ```
//!
//! The I/O-free pieces (models, chunker, flat index, pipeline) live in
//! `quarry-core`; this crate adds configuration, file loading, concrete
//! providers, the persisted index and the CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! quarry ingest ./documents
//! quarry ask "What color is the sky?"
//! quarry chat
//! quarry stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`loader`] | Text and PDF document loaders |
//! | [`scan`] | File discovery with include/exclude globs |
//! | [`embedding`] | Hash, OpenAI, Ollama and local embedding providers |
//! | [`generation`] | Echo, OpenAI and Ollama generation providers |
//! | [`file_store`] | Crash-safe persisted vector index |
//! | [`ingest`] | Batch ingestion with per-file failure reporting |
//! | [`ask`] | `ask`, `chat` and `search` commands |
//! | [`stats`] | Index statistics |
//! | [`progress`] | Ingestion progress on stderr |

pub mod ask;
pub mod config;
pub mod embedding;
pub mod file_store;
pub mod generation;
pub mod ingest;
pub mod loader;
pub mod progress;
pub mod scan;
pub mod stats;

//! # Quarry Core
//!
//! I/O-free logic for Quarry: data models, chunking, the flat vector index,
//! provider traits, document indexing, and the query pipeline.
//!
//! Nothing in this crate touches the filesystem or the network. Loaders,
//! HTTP providers, and the persisted index live in the `quarry` crate and
//! plug in through the [`embedding::EmbeddingProvider`],
//! [`generation::GenerationProvider`], and [`store::VectorStore`] traits.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod indexer;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod store;

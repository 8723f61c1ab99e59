//! Library-level tests: ingestion into a persisted index, reopening it, and
//! answering from it without going through the binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use quarry::config::{parse_config, Config};
use quarry::embedding::HashProvider;
use quarry::file_store::FileStore;
use quarry::generation::EchoProvider;
use quarry::ingest::ingest_paths;
use quarry::progress::NoProgress;
use quarry_core::embedding::EmbeddingProvider;
use quarry_core::index::Metric;
use quarry_core::pipeline::QueryPipeline;
use quarry_core::store::VectorStore;

fn config_for(root: &Path) -> Config {
    parse_config(&format!(
        "[index]\npath = {:?}\n\n[ingest]\nroot = {:?}\n",
        root.join("index"),
        root.join("docs")
    ))
    .unwrap()
}

fn write_docs(root: &Path) -> PathBuf {
    let docs = root.join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("sky.txt"), "The sky is blue. Grass is green.").unwrap();
    fs::write(
        docs.join("ocean.md"),
        "# Ocean\n\nThe ocean is deep and salty. Whales live there.",
    )
    .unwrap();
    docs
}

#[test]
fn test_reopened_index_answers_identically() {
    let tmp = TempDir::new().unwrap();
    write_docs(tmp.path());
    let config = config_for(tmp.path());

    let report = ingest_paths(&config, &[], false, &NoProgress).unwrap();
    assert_eq!(report.documents, 2);
    assert!(report.failures.is_empty());

    let embedder = HashProvider::new(256);
    let query = embedder.embed("What color is the sky?").unwrap();

    let first = FileStore::open(&config.index.path, Metric::Cosine).unwrap();
    let before = first.search(&query, 2).unwrap();
    drop(first);

    let reopened = FileStore::open(&config.index.path, Metric::Cosine).unwrap();
    let after = reopened.search(&query, 2).unwrap();

    assert_eq!(before.len(), after.len());
    for (a, b) in before.iter().zip(after.iter()) {
        assert_eq!(a.chunk, b.chunk);
        assert_eq!(a.rank, b.rank);
        assert_eq!(a.score.to_bits(), b.score.to_bits());
    }
    assert!(after[0].chunk.metadata.source.ends_with("sky.txt"));
}

#[test]
fn test_answer_cites_the_matching_document() {
    let tmp = TempDir::new().unwrap();
    write_docs(tmp.path());
    let config = config_for(tmp.path());
    ingest_paths(&config, &[], false, &NoProgress).unwrap();

    let store = FileStore::open(&config.index.path, Metric::Cosine).unwrap();
    let pipeline = QueryPipeline::new(
        Arc::new(HashProvider::new(256)),
        Arc::new(store),
        Arc::new(EchoProvider),
    )
    .with_k(1);

    let result = pipeline.query("What color is the sky?").unwrap();
    assert!(result.answer.contains("blue"));
    assert_eq!(result.sources.len(), 1);
    assert!(result.sources[0].chunk.metadata.source.ends_with("sky.txt"));
}

#[test]
fn test_second_ingest_adds_only_new_files() {
    let tmp = TempDir::new().unwrap();
    let docs = write_docs(tmp.path());
    let config = config_for(tmp.path());

    let first = ingest_paths(&config, &[], false, &NoProgress).unwrap();
    fs::write(docs.join("forest.txt"), "Forests are full of trees.").unwrap();
    let second = ingest_paths(&config, &[], false, &NoProgress).unwrap();

    assert_eq!(second.chunks_skipped, first.chunks_written);
    assert_eq!(second.chunks_written, 1);

    let store = FileStore::open(&config.index.path, Metric::Cosine).unwrap();
    assert_eq!(store.stats().entries, first.chunks_written + 1);
    assert_eq!(store.stats().documents, 3);
}

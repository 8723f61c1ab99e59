//! Ingestion orchestration.
//!
//! Coordinates the full flow for a batch of files:
//!
//! ```text
//! discover ─▶ load ─▶ chunk ─▶ embed (batched) ─▶ upsert
//! ```
//!
//! Each file is indexed as a unit. Load and embedding failures are recorded
//! against the file and the batch moves on; an index write failure stops
//! the batch, since the store is shared state. Re-ingesting unchanged
//! files is a no-op: their chunk ids are already present and nothing is
//! re-embedded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use quarry_core::chunk::Chunker;
use quarry_core::indexer::{DocumentIndexer, IndexDocumentError};
use quarry_core::store::VectorStore;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::file_store::FileStore;
use crate::loader::LoaderRegistry;
use crate::progress::{IngestProgressEvent, IngestProgressReporter, ProgressMode};
use crate::scan::discover_files;

/// A file that could not be ingested, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of one ingestion batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files: usize,
    pub documents: usize,
    /// Entries appended to the index (chunks produced, for a dry run).
    pub chunks_written: usize,
    /// Chunks already in the index.
    pub chunks_skipped: usize,
    pub failures: Vec<IngestFailure>,
}

/// Ingest `paths` (or `ingest.root` when empty) into the configured index.
pub fn ingest_paths(
    config: &Config,
    paths: &[PathBuf],
    dry_run: bool,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestReport> {
    let roots = if paths.is_empty() {
        vec![config.ingest.root.clone()]
    } else {
        paths.to_vec()
    };
    for root in &roots {
        progress.report(IngestProgressEvent::Discovering {
            root: root.display().to_string(),
        });
    }
    let files = discover_files(&config.ingest, &roots)?;
    let chunker = Chunker::new(config.chunking.to_chunk_config())?;
    let loaders = LoaderRegistry::default();

    let indexer = if dry_run {
        None
    } else {
        let store: Arc<dyn VectorStore> = Arc::new(
            FileStore::open(&config.index.path, config.index.metric)
                .context("Failed to open index")?,
        );
        let embedder = create_provider(&config.embedding)?;
        Some(
            DocumentIndexer::new(chunker.clone(), embedder, store)
                .with_batch_size(config.embedding.batch_size),
        )
    };

    let mut report = IngestReport {
        files: files.len(),
        ..IngestReport::default()
    };
    let total = files.len() as u64;

    for (i, path) in files.iter().enumerate() {
        let source = path.display().to_string();
        match ingest_file(path, &loaders, &chunker, indexer.as_ref())? {
            Ok((written, skipped)) => {
                info!(source = %source, written, skipped, "file ingested");
                report.documents += 1;
                report.chunks_written += written;
                report.chunks_skipped += skipped;
            }
            Err(error) => {
                warn!(source = %source, error = %error, "file skipped");
                report.failures.push(IngestFailure {
                    path: path.clone(),
                    error,
                });
            }
        }

        progress.report(IngestProgressEvent::Ingesting {
            source,
            n: i as u64 + 1,
            total,
        });
    }

    Ok(report)
}

/// Ingest one file. The inner error is a per-file failure to report; the
/// outer error is an index write failure that must stop the batch.
///
/// Returns `(chunks written, chunks skipped)`.
fn ingest_file(
    path: &Path,
    loaders: &LoaderRegistry,
    chunker: &Chunker,
    indexer: Option<&DocumentIndexer>,
) -> Result<std::result::Result<(usize, usize), String>> {
    let document = match loaders.load(path) {
        Ok(document) => document,
        Err(e) => return Ok(Err(e.to_string())),
    };
    let Some(indexer) = indexer else {
        let chunks = chunker.chunk_document(&document);
        let estimated = chunks.iter().filter(|c| !c.text.trim().is_empty()).count();
        return Ok(Ok((estimated, 0)));
    };
    match indexer.index(&document) {
        Ok(indexed) => Ok(Ok((indexed.added, indexed.skipped))),
        Err(IndexDocumentError::Embedding(e)) => Ok(Err(e.to_string())),
        Err(IndexDocumentError::Index(e)) => Err(anyhow::Error::new(e).context(format!(
            "index write failed while ingesting {}",
            path.display()
        ))),
    }
}

/// CLI entry point for `quarry ingest`.
pub fn run_ingest(
    config: &Config,
    paths: &[PathBuf],
    dry_run: bool,
    mode: ProgressMode,
) -> Result<()> {
    let reporter = mode.reporter();
    let report = ingest_paths(config, paths, dry_run, reporter.as_ref())?;
    print!("{}", render_report(&report, dry_run));
    Ok(())
}

fn render_report(report: &IngestReport, dry_run: bool) -> String {
    let mut out = String::new();
    if dry_run {
        out.push_str("ingest (dry-run)\n");
        out.push_str(&format!("  files: {}\n", report.files));
        out.push_str(&format!("  documents loaded: {}\n", report.documents));
        out.push_str(&format!("  estimated chunks: {}\n", report.chunks_written));
    } else {
        out.push_str("ingest\n");
        out.push_str(&format!("  files: {}\n", report.files));
        out.push_str(&format!("  documents ingested: {}\n", report.documents));
        out.push_str(&format!("  chunks written: {}\n", report.chunks_written));
        out.push_str(&format!(
            "  chunks skipped (already indexed): {}\n",
            report.chunks_skipped
        ));
    }
    if !report.failures.is_empty() {
        out.push_str(&format!("  failed: {}\n", report.failures.len()));
        for failure in &report.failures {
            out.push_str(&format!(
                "    {}: {}\n",
                failure.path.display(),
                failure.error
            ));
        }
    }
    out.push_str("ok\n");
    out
}

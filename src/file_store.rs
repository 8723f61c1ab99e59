//! File-backed [`VectorStore`]: a [`FlatIndex`] persisted as a JSON
//! snapshot.
//!
//! # On-disk layout
//!
//! ```text
//! <index.path>/
//! ├── index.json   # complete snapshot, replaced atomically on every write
//! └── index.lock   # present only while a writer is active
//! ```
//!
//! The snapshot records a format version, the metric, the dimensionality,
//! creation/update timestamps and the entries in insertion order. Vectors
//! are base64-encoded little-endian `f32` bytes, so a load reproduces them
//! bit for bit and a reopened index answers searches identically.
//!
//! # Writes
//!
//! ```text
//! write-lock ─▶ create index.lock ─▶ re-read index.json ─▶ append
//!     ─▶ temp file ─▶ fsync ─▶ rename over index.json ─▶ fsync dir
//!     ─▶ swap in memory ─▶ remove index.lock
//! ```
//!
//! The lock file serializes writers across processes and the re-read
//! picks up entries appended by another process since this store was
//! opened. A crash before the rename leaves the previous snapshot intact;
//! memory is only updated once the new snapshot is durable.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use quarry_core::embedding::{blob_to_vec, vec_to_blob};
use quarry_core::error::IndexError;
use quarry_core::index::{FlatIndex, IndexStats, Metric};
use quarry_core::models::{Chunk, IndexEntry, SearchHit};
use quarry_core::store::VectorStore;

pub const SNAPSHOT_FILE: &str = "index.json";
pub const LOCK_FILE: &str = "index.lock";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    format_version: u32,
    metric: Metric,
    dims: Option<usize>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    chunk: Chunk,
    /// Base64 of little-endian f32 bytes.
    embedding: String,
}

/// An index read from disk together with its timestamps.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub index: FlatIndex,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read the snapshot in `dir`, searching with `metric`.
///
/// Returns `Ok(None)` when no snapshot has been written yet.
pub fn load(dir: &Path, metric: Metric) -> Result<Option<Snapshot>, IndexError> {
    let path = dir.join(SNAPSHOT_FILE);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(IndexError::io(path, e)),
    };
    let corrupt = |message: String| IndexError::Corrupt {
        path: path.clone(),
        message,
    };

    let file: SnapshotFile =
        serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
    if file.format_version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported format_version {} (expected {})",
            file.format_version, FORMAT_VERSION
        )));
    }
    if file.metric != metric {
        warn!(
            stored = file.metric.as_str(),
            configured = metric.as_str(),
            "index metric differs from configuration; searching with the configured metric"
        );
    }

    let mut entries = Vec::with_capacity(file.entries.len());
    for entry in file.entries {
        let blob = BASE64
            .decode(entry.embedding.as_bytes())
            .map_err(|e| corrupt(format!("chunk {}: bad embedding encoding: {}", entry.chunk.id, e)))?;
        if blob.len() % 4 != 0 {
            return Err(corrupt(format!(
                "chunk {}: embedding length {} is not a multiple of 4",
                entry.chunk.id,
                blob.len()
            )));
        }
        entries.push(IndexEntry {
            chunk: entry.chunk,
            embedding: blob_to_vec(&blob),
        });
    }
    let index = FlatIndex::from_entries(metric, entries).map_err(|e| corrupt(e.to_string()))?;
    if index.dims() != file.dims && !index.is_empty() {
        return Err(corrupt(format!(
            "header says {:?} dimensions, entries have {:?}",
            file.dims,
            index.dims()
        )));
    }

    Ok(Some(Snapshot {
        index,
        created_at: file.created_at,
        updated_at: file.updated_at,
    }))
}

/// Atomically replace the snapshot in `dir` with `snapshot`.
///
/// Creates `dir` if needed. The previous snapshot stays in place until the
/// new one has been fully written and synced.
pub fn persist(dir: &Path, snapshot: &Snapshot) -> Result<(), IndexError> {
    fs::create_dir_all(dir).map_err(|e| IndexError::io(dir, e))?;

    let index = &snapshot.index;
    let file = SnapshotFile {
        format_version: FORMAT_VERSION,
        metric: index.metric(),
        dims: index.dims(),
        created_at: snapshot.created_at,
        updated_at: snapshot.updated_at,
        entries: index
            .entries()
            .iter()
            .map(|e| SnapshotEntry {
                chunk: e.chunk.clone(),
                embedding: BASE64.encode(vec_to_blob(&e.embedding)),
            })
            .collect(),
    };
    let bytes = serde_json::to_vec(&file)
        .map_err(|e| IndexError::io(dir, std::io::Error::new(ErrorKind::InvalidData, e)))?;

    let target = dir.join(SNAPSHOT_FILE);
    let mut tmp = tempfile::Builder::new()
        .prefix(".index-")
        .suffix(".json.tmp")
        .tempfile_in(dir)
        .map_err(|e| IndexError::io(dir, e))?;
    tmp.write_all(&bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| IndexError::io(tmp.path(), e))?;
    tmp.persist(&target)
        .map_err(|e| IndexError::io(&target, e.error))?;
    sync_dir(dir)?;

    debug!(path = %target.display(), entries = index.len(), "index snapshot written");
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), IndexError> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| IndexError::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), IndexError> {
    Ok(())
}

/// Exclusive cross-process writer lock, released on drop.
struct WriterLock {
    path: PathBuf,
}

impl WriterLock {
    fn acquire(dir: &Path) -> Result<Self, IndexError> {
        let path = dir.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(IndexError::Locked { path });
            }
            Err(e) => return Err(IndexError::io(path, e)),
        };
        // Informational only.
        if let Err(e) = writeln!(file, "pid={} at={}", std::process::id(), Utc::now().to_rfc3339()) {
            debug!(path = %path.display(), error = %e, "could not record lock owner");
        }
        Ok(Self { path })
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove index lock");
        }
    }
}

#[derive(Debug)]
struct State {
    index: FlatIndex,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

/// Persistent vector store rooted at a directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    metric: Metric,
    state: RwLock<State>,
}

impl FileStore {
    /// Open the index in `dir`. A missing directory or snapshot opens an
    /// empty index; nothing is written until the first upsert.
    pub fn open(dir: impl Into<PathBuf>, metric: Metric) -> Result<Self, IndexError> {
        let dir = dir.into();
        let state = match load(&dir, metric)? {
            Some(snapshot) => State {
                index: snapshot.index,
                created_at: Some(snapshot.created_at),
                updated_at: Some(snapshot.updated_at),
            },
            None => State {
                index: FlatIndex::new(metric),
                created_at: None,
                updated_at: None,
            },
        };
        debug!(path = %dir.display(), entries = state.index.len(), "index opened");
        Ok(Self {
            dir,
            metric,
            state: RwLock::new(state),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Time of the last durable write, if any.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.read_state().updated_at
    }

    /// A copy of the in-memory index.
    pub fn index(&self) -> FlatIndex {
        self.read_state().index.clone()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VectorStore for FileStore {
    fn upsert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize, IndexError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        fs::create_dir_all(&self.dir).map_err(|e| IndexError::io(&self.dir, e))?;
        let _lock = WriterLock::acquire(&self.dir)?;

        let latest = load(&self.dir, self.metric)?;
        let (mut index, created_at, updated_at) = match latest {
            Some(s) => (s.index, Some(s.created_at), Some(s.updated_at)),
            None => (FlatIndex::new(self.metric), None, None),
        };
        let added = index.append(chunks, embeddings)?;

        if added == 0 {
            *state = State {
                index,
                created_at,
                updated_at,
            };
            return Ok(0);
        }

        let now = Utc::now();
        let snapshot = Snapshot {
            index,
            created_at: created_at.unwrap_or(now),
            updated_at: now,
        };
        persist(&self.dir, &snapshot)?;

        *state = State {
            index: snapshot.index,
            created_at: Some(snapshot.created_at),
            updated_at: Some(now),
        };
        Ok(added)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        self.read_state().index.search(query, k)
    }

    fn contains(&self, chunk_id: &str) -> bool {
        self.read_state().index.contains(chunk_id)
    }

    fn stats(&self) -> IndexStats {
        self.read_state().index.stats()
    }
}

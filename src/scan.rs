//! Candidate file discovery for ingestion.
//!
//! Walks each root with `walkdir`, matches paths relative to the root
//! against the `[ingest]` include/exclude globs, and returns a sorted,
//! de-duplicated list. `.git`, `target` and `node_modules` are always
//! excluded. Paths that name a file directly are taken as-is.
//!
//! Discovery does not look at extensions: a matched file with no loader is
//! still returned so ingestion can report it as unsupported.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::IngestConfig;

const DEFAULT_EXCLUDES: [&str; 3] = ["**/.git/**", "**/target/**", "**/node_modules/**"];

pub fn discover_files(config: &IngestConfig, roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(&config.include_globs)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for root in roots {
        if !root.exists() {
            bail!("Ingest path does not exist: {}", root.display());
        }
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        walk(root, config.follow_symlinks, &include_set, &exclude_set, &mut files)?;
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn walk(
    root: &Path,
    follow_symlinks: bool,
    include_set: &GlobSet,
    exclude_set: &GlobSet,
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in WalkDir::new(root).follow_links(follow_symlinks) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy();

        if exclude_set.is_match(rel_str.as_ref()) || !include_set.is_match(rel_str.as_ref()) {
            continue;
        }
        out.push(path.to_path_buf());
    }
    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))?,
        );
    }
    Ok(builder.build()?)
}

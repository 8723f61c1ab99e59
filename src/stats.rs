//! Index statistics.
//!
//! A quick summary of what is indexed: entry, document and source counts,
//! dimensionality, metric, snapshot size and when it was last written.
//! Used by `quarry stats` to confirm that ingestion did what was expected.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use quarry_core::store::VectorStore;

use crate::config::Config;
use crate::file_store::FileStore;

pub fn run_stats(config: &Config, json: bool) -> Result<()> {
    let store = FileStore::open(&config.index.path, config.index.metric)
        .context("Failed to open index")?;
    let stats = store.stats();
    let updated_at = store.updated_at();
    let size = std::fs::metadata(store.snapshot_path())
        .map(|m| m.len())
        .unwrap_or(0);

    if json {
        let obj = serde_json::json!({
            "path": config.index.path.display().to_string(),
            "entries": stats.entries,
            "documents": stats.documents,
            "sources": stats.sources,
            "dims": stats.dims,
            "metric": stats.metric,
            "size_bytes": size,
            "updated_at": updated_at.map(|t| t.to_rfc3339()),
        });
        println!("{}", serde_json::to_string_pretty(&obj)?);
        return Ok(());
    }

    println!("Quarry — Index Stats");
    println!("====================");
    println!();
    println!("  Index:       {}", config.index.path.display());
    println!("  Size:        {}", format_bytes(size));
    println!("  Metric:      {}", stats.metric.as_str());
    println!(
        "  Dimensions:  {}",
        stats
            .dims
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!();
    println!("  Entries:     {}", stats.entries);
    println!("  Documents:   {}", stats.documents);
    println!("  Sources:     {}", stats.sources);
    println!(
        "  Updated:     {}",
        updated_at
            .map(format_relative)
            .unwrap_or_else(|| "never".to_string())
    );
    println!();
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// "just now", "3 hours ago", or an absolute date past 30 days.
fn format_relative(at: DateTime<Utc>) -> String {
    let delta = (Utc::now() - at).num_seconds();
    let plural = |n: i64| if n == 1 { "" } else { "s" };

    if delta < 0 {
        at.format("%Y-%m-%d %H:%M").to_string()
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, plural(mins))
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, plural(hours))
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, plural(days))
    } else {
        at.format("%Y-%m-%d %H:%M").to_string()
    }
}

//! Backfill command implementation
//!
//! Bulk-chunks existing records from a JSONL export, one `SourceRecord`
//! per line. Individual record failures are tallied, not fatal.

use crate::chunk::Chunker;
use crate::config::Config;
use crate::error::Result;
use crate::models::{ChunkStatus, SourceRecord};
use crate::progress::{advance_progress, finish_progress, start_progress_bar};
use crate::store::KnowledgeDb;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Tally of one backfill run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackfillStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub recovered: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Chunk every record in a JSONL file
pub async fn cmd_backfill(config: &Config, db: &KnowledgeDb, path: &Path) -> Result<BackfillStats> {
    info!("Backfilling records from {:?}", path);

    let content = std::fs::read_to_string(path)?;
    let lines: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();

    let chunker = Chunker::new(config.chunk.clone());
    let mut stats = BackfillStats::default();
    let pb = start_progress_bar(lines.len(), "Chunking records");

    for (line_no, line) in lines.iter().enumerate() {
        let record: SourceRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                stats.failed += 1;
                stats.errors.push(format!("line {}: {}", line_no + 1, e));
                advance_progress(&pb);
                continue;
            }
        };

        match chunker.chunk(db, &record).await {
            Ok(outcome) => match outcome.status {
                ChunkStatus::Created => stats.created += 1,
                ChunkStatus::Updated => stats.updated += 1,
                ChunkStatus::Unchanged => stats.unchanged += 1,
                ChunkStatus::Recovered => stats.recovered += 1,
            },
            Err(e) => {
                warn!("Failed to chunk record '{}': {}", record.source_id, e);
                stats.failed += 1;
                stats
                    .errors
                    .push(format!("{} ({}): {}", record.source_id, record.kind, e));
            }
        }
        advance_progress(&pb);
    }

    finish_progress(pb, "Backfill complete");
    info!(
        "Backfill done: {} created, {} updated, {} unchanged, {} recovered, {} failed",
        stats.created, stats.updated, stats.unchanged, stats.recovered, stats.failed
    );
    Ok(stats)
}

/// Print backfill stats to console
pub fn print_backfill_stats(stats: &BackfillStats) {
    println!("\n📦 Backfill complete\n");
    println!("  Created:   {}", stats.created);
    println!("  Updated:   {}", stats.updated);
    println!("  Unchanged: {}", stats.unchanged);
    println!("  Recovered: {}", stats.recovered);
    println!("  Failed:    {}", stats.failed);

    if !stats.errors.is_empty() {
        println!("\nErrors:");
        for error in &stats.errors {
            println!("  • {}", error);
        }
    }
}

//! Chunk command implementation

use crate::chunk::Chunker;
use crate::config::Config;
use crate::error::Result;
use crate::models::{ChunkOutcome, SourceRecord};
use crate::store::KnowledgeDb;
use tracing::info;

/// Chunk a single source record
pub async fn cmd_chunk(
    config: &Config,
    db: &KnowledgeDb,
    record: &SourceRecord,
) -> Result<ChunkOutcome> {
    info!(
        "Chunking record '{}' ({}) for tenant '{}'",
        record.source_id, record.kind, record.tenant_id
    );

    let chunker = Chunker::new(config.chunk.clone());
    chunker.chunk(db, record).await
}

/// Print a chunk outcome to console
pub fn print_chunk_outcome(outcome: &ChunkOutcome) {
    println!("\nStatus: {}", outcome.status);
    println!("Chunks: {}\n", outcome.chunks.len());

    for chunk in &outcome.chunks {
        let role = if chunk.parent_id.is_none() {
            "root"
        } else {
            "child"
        };
        println!(
            "• [{}] position {} ({} chars)",
            role,
            chunk.position,
            chunk.char_count()
        );
        if let Some(title) = &chunk.title {
            println!("  Title: {}", title);
        }
        println!("  ID: {}", chunk.id);
    }
}

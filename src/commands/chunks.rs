//! Chunks command implementation

use crate::error::Result;
use crate::models::{ChunkKind, KnowledgeChunk, SourcePolicy};
use crate::store::KnowledgeDb;
use tracing::info;

const ALL_KINDS: [ChunkKind; 4] = [
    ChunkKind::Faq,
    ChunkKind::Manual,
    ChunkKind::Product,
    ChunkKind::Page,
];

/// List a tenant's chunks, optionally limited to one kind
pub async fn cmd_list_chunks(
    db: &KnowledgeDb,
    tenant_id: &str,
    kind: Option<ChunkKind>,
) -> Result<Vec<KnowledgeChunk>> {
    match kind {
        Some(kind) => db.list_chunks(tenant_id, kind).await,
        None => {
            let mut all = Vec::new();
            for kind in ALL_KINDS {
                all.extend(db.list_chunks(tenant_id, kind).await?);
            }
            Ok(all)
        }
    }
}

/// Remove the chunk set for a source record.
///
/// The kind's delete policy applies unless `orphan` forces keeping the
/// content with its source link nulled.
pub async fn cmd_remove_chunks(
    db: &KnowledgeDb,
    tenant_id: &str,
    source_id: &str,
    kind: ChunkKind,
    orphan: bool,
) -> Result<usize> {
    let policy = if orphan {
        SourcePolicy::Orphan
    } else {
        kind.delete_policy()
    };
    info!(
        "Removing chunks for source '{}' ({}) with policy {:?}",
        source_id, kind, policy
    );
    db.delete_for_source(tenant_id, source_id, kind, policy).await
}

/// Print a chunk listing to console
pub fn print_chunks(chunks: &[KnowledgeChunk]) {
    println!("\n📄 Chunks\n");

    if chunks.is_empty() {
        println!("No chunks found.");
        return;
    }

    for chunk in chunks {
        let source = chunk.source_id.as_deref().unwrap_or("(orphaned)");
        let role = if chunk.parent_id.is_none() {
            "root"
        } else {
            "child"
        };
        println!(
            "• [{}] {} pos {} source {} ({} chars)",
            chunk.kind,
            role,
            chunk.position,
            source,
            chunk.char_count()
        );
        if let Some(title) = &chunk.title {
            println!("  Title: {}", title);
        }
        println!("  ID: {}", chunk.id);
        if chunk.user_corrected {
            println!("  User-corrected, priority {:.1}", chunk.priority);
        }
    }
}

/// Print a removal result to console
pub fn print_removal(removed: usize, orphaned: bool) {
    if orphaned {
        println!("✓ Source link removed; content kept as orphan.");
    } else {
        println!("✓ Removed {} chunk(s).", removed);
    }
}

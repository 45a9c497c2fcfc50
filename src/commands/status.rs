//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::store::{GlobalStats, KnowledgeDb, TenantStats};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub scorer_backend: String,
    pub reranker_enabled: bool,
    pub stats: GlobalStats,
    pub tenant: Option<TenantStats>,
}

/// Get system status, optionally with one tenant's breakdown
pub async fn cmd_status(
    config: &Config,
    db: &KnowledgeDb,
    tenant_id: Option<&str>,
) -> Result<StatusInfo> {
    info!("Getting status");

    let stats = db.get_global_stats().await?;
    let tenant = match tenant_id {
        Some(t) => Some(db.get_tenant_stats(t).await?),
        None => None,
    };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        scorer_backend: config.scorer.backend.clone(),
        reranker_enabled: config.reranker.enabled,
        stats,
        tenant,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 concierge Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("Scorer backend: {}", status.scorer_backend);
    println!(
        "Reranker: {}",
        if status.reranker_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );

    println!("\nKnowledge base:");
    println!("  Tenants: {}", status.stats.tenant_count);
    println!("  Chunks: {}", status.stats.chunk_count);
    println!(
        "  Keywords: {} ({} global)",
        status.stats.keyword_count, status.stats.global_keyword_count
    );

    if let Some(tenant) = &status.tenant {
        println!("\nTenant '{}':", tenant.tenant_id);
        println!("  Chunks: {}", tenant.chunk_count);
        for kc in &tenant.chunks_by_kind {
            println!("    {}: {}", kc.kind, kc.count);
        }
        println!("  Keywords: {}", tenant.keyword_count);
    }
}

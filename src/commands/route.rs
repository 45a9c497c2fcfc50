//! Route command implementation

use crate::config::Config;
use crate::error::Result;
use crate::route::{KeywordIndex, QueryRouter, RouteDecision};
use crate::store::KnowledgeDb;
use tracing::info;

/// Route a query to an intent for one tenant
pub async fn cmd_route(
    config: &Config,
    db: &KnowledgeDb,
    tenant_id: &str,
    query: &str,
) -> Result<RouteDecision> {
    info!("Routing query for tenant '{}'", tenant_id);

    let rows = db.load_keywords(tenant_id).await?;
    let router = QueryRouter::new(KeywordIndex::build(&rows), config.route.clone());
    Ok(router.route(query))
}

/// Print a routing decision to console
pub fn print_route_decision(decision: &RouteDecision) {
    println!("\nIntent: {}", decision.intent);
    println!("Confidence: {:.2}", decision.confidence);

    if decision.matched.is_empty() {
        println!("No keywords matched (fallback intent).");
        return;
    }

    println!("Matched keywords:");
    for m in &decision.matched {
        let scope = if m.tenant_owned { "tenant" } else { "global" };
        println!("  • {} [{}] weight {:.1}", m.keyword, scope, m.weight);
    }
}

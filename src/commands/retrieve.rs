//! Retrieve command implementation

use crate::config::Config;
use crate::error::Result;
use crate::models::ChunkKind;
use crate::rerank::create_reranker;
use crate::retrieve::{RetrievalEngine, RetrievalRequest, RetrievedContext};
use crate::route::{KeywordIndex, QueryRouter};
use crate::score::create_scorer;
use crate::store::KnowledgeDb;
use tracing::{debug, info};

/// Retrieve options
#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    pub tenant_id: String,
    pub query: String,
    pub primary_source: ChunkKind,
    pub secondary_sources: Vec<ChunkKind>,
    pub primary_budget: Option<usize>,
    pub secondary_budget: Option<usize>,
    pub rerank: Option<bool>,
}

/// Route the query, then retrieve budgeted context
pub async fn cmd_retrieve(
    config: &Config,
    db: &KnowledgeDb,
    options: RetrieveOptions,
) -> Result<RetrievedContext> {
    info!(
        "Retrieving context for tenant '{}': {}",
        options.tenant_id, options.query
    );

    let rows = db.load_keywords(&options.tenant_id).await?;
    let router = QueryRouter::new(KeywordIndex::build(&rows), config.route.clone());
    let routing = router.route(&options.query);
    debug!("Routed to intent '{}'", routing.intent);

    let rerank = options.rerank.unwrap_or(config.reranker.enabled);
    let scorer = create_scorer(&config.scorer)?;
    let reranker = if rerank {
        Some(create_reranker(&config.reranker)?)
    } else {
        None
    };
    let engine = RetrievalEngine::new(scorer, reranker, config.retrieve.clone());

    let request = RetrievalRequest {
        tenant_id: options.tenant_id,
        query: options.query,
        routing: Some(routing),
        primary_source: options.primary_source,
        secondary_sources: options.secondary_sources,
        primary_budget: options.primary_budget.unwrap_or(config.retrieve.primary_budget),
        secondary_budget: options
            .secondary_budget
            .unwrap_or(config.retrieve.secondary_budget),
        rerank,
    };

    engine.retrieve(db, &request).await
}

/// Print retrieved context to console
pub fn print_context(context: &RetrievedContext) {
    if context.is_empty() {
        println!("\nNo context retrieved.");
        return;
    }

    println!(
        "\n🔍 Retrieved {} chunk(s), {} chars total\n",
        context.primary.len() + context.secondary.len(),
        context.total_chars()
    );

    if !context.primary.is_empty() {
        println!("Primary:");
        print_chunks_section(&context.primary);
    }
    if !context.secondary.is_empty() {
        println!("Secondary:");
        print_chunks_section(&context.secondary);
    }
}

fn print_chunks_section(chunks: &[crate::retrieve::ContextChunk]) {
    for (i, c) in chunks.iter().enumerate() {
        let truncated = if c.truncated { " (truncated)" } else { "" };
        println!(
            "{}. [score: {:.3}] [{}] priority {:.1}{}",
            i + 1,
            c.score,
            c.chunk.kind,
            c.chunk.priority,
            truncated
        );
        if let Some(title) = &c.chunk.title {
            println!("   Title: {}", title);
        }
        let preview: String = c.chunk.body.chars().take(200).collect();
        let ellipsis = if c.chunk.char_count() > 200 { "..." } else { "" };
        println!("   {}{}\n", preview.replace('\n', " "), ellipsis);
    }
}

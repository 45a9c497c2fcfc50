//! Budgeted context retrieval
//!
//! Selects the chunks worth showing the language model for one incoming
//! message: score every candidate for the tenant and kind, rank by
//! relevance times priority, optionally rerank, then pack greedily into
//! a character budget. One primary source plus any number of secondary
//! sources, each packed under its own budget.

use crate::config::RetrieveConfig;
use crate::error::{Error, Result};
use crate::models::{ChunkKind, KnowledgeChunk};
use crate::rerank::Reranker;
use crate::route::RouteDecision;
use crate::score::RelevanceScorer;
use crate::store::KnowledgeDb;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// One retrieval call; not persisted
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub tenant_id: String,
    pub query: String,
    /// Routing decision for the query, if the caller ran the router
    pub routing: Option<RouteDecision>,
    pub primary_source: ChunkKind,
    pub secondary_sources: Vec<ChunkKind>,
    /// Primary context budget in characters
    pub primary_budget: usize,
    /// Per-source secondary budget in characters
    pub secondary_budget: usize,
    pub rerank: bool,
}

/// A chunk selected into the context window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextChunk {
    #[serde(flatten)]
    pub chunk: KnowledgeChunk,
    pub score: f32,
    /// Body was cut to fit the budget
    pub truncated: bool,
}

/// The assembled context for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub primary: Vec<ContextChunk>,
    pub secondary: Vec<ContextChunk>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }

    pub fn total_chars(&self) -> usize {
        self.primary
            .iter()
            .chain(self.secondary.iter())
            .map(|c| c.chunk.char_count())
            .sum()
    }
}

/// Retrieval engine over a scorer and an optional reranker
pub struct RetrievalEngine {
    scorer: Box<dyn RelevanceScorer>,
    reranker: Option<Box<dyn Reranker>>,
    config: RetrieveConfig,
}

impl RetrievalEngine {
    pub fn new(
        scorer: Box<dyn RelevanceScorer>,
        reranker: Option<Box<dyn Reranker>>,
        config: RetrieveConfig,
    ) -> Self {
        Self {
            scorer,
            reranker,
            config,
        }
    }

    /// Retrieve context for a query under the per-call timeout.
    ///
    /// Failures of storage or scoring backends, and the timeout itself,
    /// all surface as `RetrievalUnavailable` so the caller can degrade
    /// to answering without context.
    pub async fn retrieve(
        &self,
        db: &KnowledgeDb,
        request: &RetrievalRequest,
    ) -> Result<RetrievedContext> {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        match tokio::time::timeout(timeout, self.retrieve_inner(db, request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::RetrievalUnavailable(format!(
                "Retrieval timed out after {}s",
                self.config.timeout_secs
            ))),
        }
    }

    async fn retrieve_inner(
        &self,
        db: &KnowledgeDb,
        request: &RetrievalRequest,
    ) -> Result<RetrievedContext> {
        let scorer_query = build_scorer_query(request);

        let primary = self
            .select_for_kind(
                db,
                request,
                request.primary_source,
                request.primary_budget,
                &scorer_query,
            )
            .await?;

        // Secondary sources run concurrently; try_join_all keeps the
        // caller's order in the output
        let pending = request.secondary_sources.iter().map(|kind| {
            self.select_for_kind(db, request, *kind, request.secondary_budget, &scorer_query)
        });
        let results = futures::future::try_join_all(pending).await?;
        let secondary = results.into_iter().flatten().collect();

        Ok(RetrievedContext { primary, secondary })
    }

    /// Fetch, score, rank, optionally rerank, and budget-pack one source kind
    async fn select_for_kind(
        &self,
        db: &KnowledgeDb,
        request: &RetrievalRequest,
        kind: ChunkKind,
        budget: usize,
        scorer_query: &str,
    ) -> Result<Vec<ContextChunk>> {
        if budget == 0 {
            return Ok(Vec::new());
        }

        let chunks = db
            .list_chunks(&request.tenant_id, kind)
            .await
            .map_err(|e| Error::RetrievalUnavailable(format!("Storage error: {}", e)))?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let bodies: Vec<String> = chunks.iter().map(|c| c.body.clone()).collect();
        let scores = self
            .scorer
            .score(scorer_query, &bodies)
            .await
            .map_err(|e| Error::RetrievalUnavailable(format!("Scorer error: {}", e)))?;

        let mut ranked: Vec<(KnowledgeChunk, f32)> = chunks
            .into_iter()
            .zip(scores)
            .filter(|(_, score)| *score >= self.config.min_score)
            .collect();

        ranked.sort_by(|(a, sa), (b, sb)| {
            let combined_a = *sa as f64 * a.priority;
            let combined_b = *sb as f64 * b.priority;
            combined_b
                .partial_cmp(&combined_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.priority
                        .partial_cmp(&a.priority)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.position.cmp(&b.position))
                .then_with(|| a.id.cmp(&b.id))
        });

        if request.rerank {
            if let Some(reranker) = &self.reranker {
                ranked = rerank_candidates(reranker.as_ref(), &request.query, ranked)
                    .await
                    .map_err(|e| {
                        Error::RetrievalUnavailable(format!("Reranker error: {}", e))
                    })?;
            }
        }

        let selected = pack_budget(ranked, budget);
        debug!(
            "Selected {} chunk(s) for tenant '{}' kind '{}' under budget {}",
            selected.len(),
            request.tenant_id,
            kind,
            budget
        );
        Ok(selected)
    }
}

/// Append matched keyword texts to the query so intent evidence boosts
/// topically matching chunks
fn build_scorer_query(request: &RetrievalRequest) -> String {
    let Some(decision) = &request.routing else {
        return request.query.clone();
    };
    if decision.matched.is_empty() {
        return request.query.clone();
    }

    let mut query = request.query.clone();
    for m in &decision.matched {
        query.push(' ');
        query.push_str(&m.keyword);
    }
    query
}

/// Reorder candidates by the reranker without losing any: backend indices
/// missing from the response are appended in their original order.
async fn rerank_candidates(
    reranker: &dyn Reranker,
    query: &str,
    ranked: Vec<(KnowledgeChunk, f32)>,
) -> Result<Vec<(KnowledgeChunk, f32)>> {
    let documents: Vec<String> = ranked.iter().map(|(c, _)| c.body.clone()).collect();
    let results = reranker.rerank(query, documents).await?;

    let mut seen = vec![false; ranked.len()];
    let mut order: Vec<usize> = Vec::with_capacity(ranked.len());
    for result in results {
        if result.index < ranked.len() && !seen[result.index] {
            seen[result.index] = true;
            order.push(result.index);
        }
    }
    for (i, taken) in seen.iter().enumerate() {
        if !taken {
            order.push(i);
        }
    }

    Ok(order.into_iter().map(|i| ranked[i].clone()).collect())
}

/// Greedy packing into a character budget. Overflowing chunks are
/// skipped, except that the best candidate is truncated rather than
/// returning an empty selection.
fn pack_budget(candidates: Vec<(KnowledgeChunk, f32)>, budget: usize) -> Vec<ContextChunk> {
    let mut selected = Vec::new();
    let mut used = 0usize;

    for (chunk, score) in candidates {
        let len = chunk.char_count();
        if used + len <= budget {
            used += len;
            selected.push(ContextChunk {
                chunk,
                score,
                truncated: false,
            });
        } else if selected.is_empty() {
            // Never come back empty-handed when candidates exist: cut the
            // best one down to the budget, keeping at least one character
            let mut chunk = chunk;
            chunk.body = chunk.body.chars().take(budget.max(1)).collect();
            selected.push(ContextChunk {
                chunk,
                score,
                truncated: true,
            });
            used = budget;
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{ChunkStatus, SourceRecord};
    use crate::rerank::RerankResult;
    use crate::route::{MatchedKeyword, QueryRouter};
    use crate::score::LexicalScorer;
    use async_trait::async_trait;
    use tempfile::TempDir;

    async fn setup_db() -> (KnowledgeDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = KnowledgeDb::new(&tmp.path().join("test.db")).await.unwrap();
        (db, tmp)
    }

    fn engine() -> RetrievalEngine {
        RetrievalEngine::new(
            Box::new(LexicalScorer::new()),
            None,
            Config::default().retrieve,
        )
    }

    fn request(tenant: &str, query: &str) -> RetrievalRequest {
        let config = Config::default().retrieve;
        RetrievalRequest {
            tenant_id: tenant.to_string(),
            query: query.to_string(),
            routing: None,
            primary_source: ChunkKind::Faq,
            secondary_sources: Vec::new(),
            primary_budget: config.primary_budget,
            secondary_budget: config.secondary_budget,
            rerank: false,
        }
    }

    async fn insert_faq(db: &KnowledgeDb, source: &str, body: &str, priority: f64) {
        let chunk = KnowledgeChunk::new_root(
            "t1",
            ChunkKind::Faq,
            source,
            None,
            body.to_string(),
            format!("hash-{}", source),
            priority,
            priority > 1.0,
        );
        db.insert_chunk_set(&chunk, &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_source_is_ok() {
        let (db, _tmp) = setup_db().await;
        let context = engine().retrieve(&db, &request("t1", "anything")).await.unwrap();
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_budget_respected() {
        let (db, _tmp) = setup_db().await;
        insert_faq(&db, "f1", "Shipping takes three to five days within the country.", 1.0).await;
        insert_faq(&db, "f2", "Shipping abroad takes ten days and costs extra.", 1.0).await;

        let mut req = request("t1", "how long does shipping take");
        req.primary_budget = 60;
        let context = engine().retrieve(&db, &req).await.unwrap();

        assert!(!context.primary.is_empty());
        assert!(context.total_chars() <= 60);
    }

    #[tokio::test]
    async fn test_best_candidate_truncated_not_dropped() {
        let (db, _tmp) = setup_db().await;
        insert_faq(
            &db,
            "f1",
            "Returns are accepted within thirty days of purchase with the original receipt.",
            1.0,
        )
        .await;

        let mut req = request("t1", "returns policy");
        req.primary_budget = 20;
        let context = engine().retrieve(&db, &req).await.unwrap();

        assert_eq!(context.primary.len(), 1);
        assert!(context.primary[0].truncated);
        assert_eq!(context.primary[0].chunk.char_count(), 20);
    }

    #[tokio::test]
    async fn test_zero_budget_empty() {
        let (db, _tmp) = setup_db().await;
        insert_faq(&db, "f1", "Some answer body.", 1.0).await;

        let mut req = request("t1", "answer");
        req.primary_budget = 0;
        let context = engine().retrieve(&db, &req).await.unwrap();
        assert!(context.primary.is_empty());
    }

    #[tokio::test]
    async fn test_priority_breaks_relevance_ties() {
        let (db, _tmp) = setup_db().await;
        // Identical bodies score identically; the corrected record's
        // boosted priority must put it first
        insert_faq(&db, "plain", "Our support line answers weekdays.", 1.0).await;
        insert_faq(&db, "boosted", "Our support line answers weekdays.", 1.5).await;

        let context = engine()
            .retrieve(&db, &request("t1", "support line"))
            .await
            .unwrap();

        assert_eq!(context.primary.len(), 2);
        assert_eq!(context.primary[0].chunk.source_id.as_deref(), Some("boosted"));
        assert!(context.primary[0].chunk.user_corrected);
    }

    #[tokio::test]
    async fn test_secondary_sources_in_caller_order() {
        let (db, _tmp) = setup_db().await;
        insert_faq(&db, "f1", "FAQ answer about shipping.", 1.0).await;
        let product = KnowledgeChunk::new_root(
            "t1",
            ChunkKind::Product,
            "p1",
            Some("Teapot".to_string()),
            "Ceramic teapot, ships in protective packaging.".to_string(),
            "hash-p1".to_string(),
            1.0,
            false,
        );
        db.insert_chunk_set(&product, &[]).await.unwrap();
        let page = KnowledgeChunk::new_root(
            "t1",
            ChunkKind::Page,
            "pg1",
            None,
            "Shipping page content.".to_string(),
            "hash-pg1".to_string(),
            1.0,
            false,
        );
        db.insert_chunk_set(&page, &[]).await.unwrap();

        let mut req = request("t1", "shipping");
        req.secondary_sources = vec![ChunkKind::Page, ChunkKind::Product];
        let context = engine().retrieve(&db, &req).await.unwrap();

        assert_eq!(context.secondary.len(), 2);
        assert_eq!(context.secondary[0].chunk.kind, "page");
        assert_eq!(context.secondary[1].chunk.kind, "product");
    }

    #[tokio::test]
    async fn test_routing_keywords_boost_scoring() {
        let (db, _tmp) = setup_db().await;
        insert_faq(&db, "addr", "آدرس فروشگاه: تهران، خیابان آزادی، پلاک ۱۲", 1.0).await;
        insert_faq(&db, "hours", "ساعت کاری فروشگاه ۹ تا ۱۷ است", 1.0).await;

        let mut req = request("t1", "ادرستون کجاست");
        req.routing = Some(RouteDecision {
            intent: "contact".to_string(),
            confidence: 0.5,
            matched: vec![MatchedKeyword {
                keyword: "ادرس".to_string(),
                intent: "contact".to_string(),
                weight: 1.0,
                tenant_owned: false,
            }],
        });
        let context = engine().retrieve(&db, &req).await.unwrap();

        assert!(!context.primary.is_empty());
        assert_eq!(context.primary[0].chunk.source_id.as_deref(), Some("addr"));
    }

    struct ReversingReranker;

    #[async_trait]
    impl Reranker for ReversingReranker {
        async fn rerank(&self, _query: &str, documents: Vec<String>) -> Result<Vec<RerankResult>> {
            // Reverses order and "forgets" index 0; the engine must append it
            Ok((1..documents.len())
                .rev()
                .map(|index| RerankResult {
                    index,
                    score: index as f32,
                })
                .collect())
        }

        fn model_name(&self) -> &str {
            "reversing"
        }
    }

    #[tokio::test]
    async fn test_rerank_preserves_membership() {
        let (db, _tmp) = setup_db().await;
        insert_faq(&db, "f1", "First answer about delivery.", 1.0).await;
        insert_faq(&db, "f2", "Second answer about delivery.", 1.0).await;
        insert_faq(&db, "f3", "Third answer about delivery.", 1.0).await;

        let eng = RetrievalEngine::new(
            Box::new(LexicalScorer::new()),
            Some(Box::new(ReversingReranker)),
            Config::default().retrieve,
        );

        let mut req = request("t1", "delivery");
        req.rerank = true;
        let context = eng.retrieve(&db, &req).await.unwrap();

        let mut sources: Vec<_> = context
            .primary
            .iter()
            .filter_map(|c| c.chunk.source_id.clone())
            .collect();
        sources.sort();
        assert_eq!(sources, vec!["f1", "f2", "f3"]);
    }

    struct StalledScorer;

    #[async_trait]
    impl RelevanceScorer for StalledScorer {
        async fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![0.0; documents.len()])
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_timeout_maps_to_unavailable() {
        let (db, _tmp) = setup_db().await;
        insert_faq(&db, "f1", "Answer body.", 1.0).await;

        let mut config = Config::default().retrieve;
        config.timeout_secs = 1;
        let eng = RetrievalEngine::new(Box::new(StalledScorer), None, config);
        let result = eng.retrieve(&db, &request("t1", "answer")).await;

        assert!(matches!(result, Err(Error::RetrievalUnavailable(_))));
    }

    #[tokio::test]
    async fn test_route_then_retrieve_persian_faq() {
        let (db, _tmp) = setup_db().await;
        insert_faq(&db, "addr", "آدرس فروشگاه: تهران، خیابان آزادی، پلاک ۱۲", 1.0).await;

        db.insert_keyword(&crate::models::IntentKeyword::new(None, "contact", "ادرس", "fa"))
            .await
            .unwrap();
        let rows = db.load_keywords("t1").await.unwrap();
        let router = QueryRouter::new(
            crate::route::KeywordIndex::build(&rows),
            Config::default().route,
        );

        let decision = router.route("ادرستون کجاست؟");
        assert_eq!(decision.intent, "contact");

        let mut req = request("t1", "ادرستون کجاست؟");
        req.routing = Some(decision);
        let context = engine().retrieve(&db, &req).await.unwrap();
        assert_eq!(context.primary[0].chunk.source_id.as_deref(), Some("addr"));
    }

    #[tokio::test]
    async fn test_chunked_record_retrievable() {
        let (db, _tmp) = setup_db().await;

        let chunker = crate::chunk::Chunker::new(Config::default().chunk);
        let record = SourceRecord {
            tenant_id: "t1".to_string(),
            source_id: "faq-9".to_string(),
            kind: ChunkKind::Faq,
            title: Some("Warranty".to_string()),
            text: "All products carry a two year warranty. Contact support to start a claim."
                .to_string(),
            lang: Some("en".to_string()),
            user_corrected: false,
        };
        let outcome = chunker.chunk(&db, &record).await.unwrap();
        assert_eq!(outcome.status, ChunkStatus::Created);

        let context = engine()
            .retrieve(&db, &request("t1", "warranty claim"))
            .await
            .unwrap();
        assert!(!context.primary.is_empty());
    }
}

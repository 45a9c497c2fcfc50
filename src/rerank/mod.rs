//! Cross-encoder reranking of retrieval candidates

mod http_backend;

pub use http_backend::*;

use crate::config::RerankerConfig;
use crate::error::Result;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct RerankResult {
    pub index: usize,
    pub score: f32,
}

#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, documents: Vec<String>) -> Result<Vec<RerankResult>>;
    fn model_name(&self) -> &str;
}

pub fn create_reranker(config: &RerankerConfig) -> Result<Box<dyn Reranker>> {
    let reranker = HttpReranker::new(config)?;
    Ok(Box::new(reranker))
}

use super::{RerankResult, Reranker};
use crate::config::RerankerConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct RerankRequest {
    model: String,
    query: String,
    documents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RerankResponse {
    results: Vec<RerankItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct RerankItem {
    index: usize,
    score: f32,
}

pub struct HttpReranker {
    client: Client,
    base_url: Url,
    model_id: String,
}

impl HttpReranker {
    pub fn new(config: &RerankerConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("Invalid reranker backend URL: {}", e)))?;
        Ok(Self {
            client: Client::new(),
            base_url,
            model_id: config.model.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid reranker backend URL: {}", e)))
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(&self, query: &str, documents: Vec<String>) -> Result<Vec<RerankResult>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.endpoint("/v1/rerank")?;
        let request = RerankRequest {
            model: self.model_id.clone(),
            query: query.to_string(),
            documents,
        };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let parsed = response.json::<RerankResponse>().await?;
        Ok(parsed
            .results
            .into_iter()
            .map(|item| RerankResult {
                index: item.index,
                score: item.score,
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reranker_for(url: &str) -> HttpReranker {
        let config = RerankerConfig {
            enabled: true,
            url: url.to_string(),
            model: "test-rerank".to_string(),
        };
        HttpReranker::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_empty_documents_skip_request() {
        let reranker = reranker_for("http://127.0.0.1:1");
        let results = reranker.rerank("query", Vec::new()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_rerank_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/rerank"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"index": 1, "score": 0.9},
                    {"index": 0, "score": 0.2}
                ]
            })))
            .mount(&server)
            .await;

        let reranker = reranker_for(&server.uri());
        let results = reranker
            .rerank("query", vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 1);
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/rerank"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let reranker = reranker_for(&server.uri());
        let result = reranker.rerank("query", vec!["a".to_string()]).await;
        assert!(result.is_err());
    }
}

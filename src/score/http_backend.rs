//! HTTP embedding backend for relevance scoring

use crate::config::ScorerConfig;
use crate::error::{Error, Result};
use crate::score::RelevanceScorer;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct EmbedTextRequest {
    model: String,
    inputs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Embeddings { embeddings: Vec<Vec<f32>> },
    Vectors { vectors: Vec<Vec<f32>> },
    Data { data: Vec<EmbeddingData> },
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    fn into_embeddings(self) -> Vec<Vec<f32>> {
        match self {
            EmbeddingResponse::Embeddings { embeddings } => embeddings,
            EmbeddingResponse::Vectors { vectors } => vectors,
            EmbeddingResponse::Data { data } => data.into_iter().map(|d| d.embedding).collect(),
        }
    }
}

/// Embedding-sidecar scorer: embeds the query and the documents in one
/// batch and scores each document by cosine similarity, remapped from
/// [-1, 1] to [0, 1].
pub struct HttpScorer {
    client: Client,
    base_url: Url,
    model: String,
    retries: usize,
}

impl HttpScorer {
    pub fn new(config: &ScorerConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            retries: 2,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid scorer backend URL: {}", e)))
    }

    async fn send_with_retry<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let mut last_err: Option<Error> = None;
        for attempt in 0..=self.retries {
            let req = request
                .try_clone()
                .ok_or_else(|| Error::Scorer("Failed to clone backend request".to_string()))?;
            match req.send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(ok) => return Ok(ok.json::<T>().await?),
                    Err(e) => last_err = Some(Error::Scorer(e.to_string())),
                },
                Err(e) => last_err = Some(Error::Scorer(e.to_string())),
            }

            if attempt < self.retries {
                tokio::time::sleep(Duration::from_millis(200 * (attempt + 1) as u64)).await;
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Scorer("Scorer backend request failed".to_string())))
    }

    async fn embed_text(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint("/v1/embed/text")?;
        let request = EmbedTextRequest {
            model: self.model.clone(),
            inputs,
        };
        let parsed: EmbeddingResponse = self
            .send_with_retry(self.client.post(url).json(&request))
            .await?;
        Ok(parsed.into_embeddings())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl RelevanceScorer for HttpScorer {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        // Query first, then documents, all in one batch
        let mut inputs = Vec::with_capacity(documents.len() + 1);
        inputs.push(query.to_string());
        inputs.extend(documents.iter().cloned());

        let embeddings = self.embed_text(inputs).await?;
        if embeddings.len() != documents.len() + 1 {
            return Err(Error::Scorer(format!(
                "Backend returned {} embeddings for {} inputs",
                embeddings.len(),
                documents.len() + 1
            )));
        }

        let query_vec = &embeddings[0];
        Ok(embeddings[1..]
            .iter()
            .map(|doc_vec| (cosine_similarity(query_vec, doc_vec) + 1.0) / 2.0)
            .collect())
    }

    fn name(&self) -> &str {
        "http"
    }
}

//! Relevance scoring for retrieval candidates
//!
//! The retrieval engine only fixes the budgeting and ordering contract;
//! the scalar relevance score itself comes from a pluggable backend:
//! - `LexicalScorer`: in-process BM25-flavored term overlap (default)
//! - `HttpScorer`: embedding sidecar over HTTP plus cosine similarity

mod http_backend;

pub use http_backend::*;

use crate::config::ScorerConfig;
use crate::error::{Error, Result};
use crate::route::fold_text;
use async_trait::async_trait;
use unicode_segmentation::UnicodeSegmentation;

/// Trait for relevance scoring backends.
///
/// Scores are comparable within one call and lie in [0, 1]; a batch of
/// documents is scored against a single query.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Score every document against the query, in input order
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;

    /// Backend name for logging and status output
    fn name(&self) -> &str;
}

/// Create a scorer based on configuration
pub fn create_scorer(config: &ScorerConfig) -> Result<Box<dyn RelevanceScorer>> {
    match config.backend.as_str() {
        "lexical" => Ok(Box::new(LexicalScorer::new())),
        "http" => Ok(Box::new(HttpScorer::new(config)?)),
        other => Err(Error::Config(format!(
            "Unknown scorer backend '{}'",
            other
        ))),
    }
}

/// BM25-flavored term-overlap scorer.
///
/// Uses the folded form of query and documents so it agrees with the
/// router about what counts as the same word. Raw BM25 sums are squashed
/// through s/(s+1) to land in [0, 1).
pub struct LexicalScorer {
    k1: f32,
    b: f32,
}

impl LexicalScorer {
    pub fn new() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }

    /// Tokenize a query into folded terms
    pub fn tokenize(query: &str) -> Vec<String> {
        fold_text(query)
            .unicode_words()
            .filter(|w| w.chars().count() >= 2)
            .map(String::from)
            .collect()
    }

    fn score_one(&self, terms: &[String], doc_folded: &str, avg_doc_len: f32) -> f32 {
        let doc_len = doc_folded.chars().count() as f32;
        let mut total = 0.0f32;

        for term in terms {
            let tf = doc_folded.matches(term.as_str()).count() as f32;
            if tf > 0.0 {
                // Per-call scoring without corpus statistics: flat idf
                let numerator = tf * (self.k1 + 1.0);
                let denominator =
                    tf + self.k1 * (1.0 - self.b + self.b * (doc_len / avg_doc_len.max(1.0)));
                total += numerator / denominator;
            }
        }

        total / (total + 1.0)
    }
}

impl Default for LexicalScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelevanceScorer for LexicalScorer {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let terms = Self::tokenize(query);
        if terms.is_empty() {
            return Ok(vec![0.0; documents.len()]);
        }

        let folded: Vec<String> = documents.iter().map(|d| fold_text(d)).collect();
        let avg_doc_len = folded.iter().map(|d| d.chars().count()).sum::<usize>() as f32
            / folded.len() as f32;

        Ok(folded
            .iter()
            .map(|doc| self.score_one(&terms, doc, avg_doc_len))
            .collect())
    }

    fn name(&self) -> &str {
        "lexical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_documents() {
        let scorer = LexicalScorer::new();
        let scores = scorer.score("anything", &[]).await.unwrap();
        assert!(scores.is_empty());
    }

    #[tokio::test]
    async fn test_relevant_doc_scores_higher() {
        let scorer = LexicalScorer::new();
        let docs = vec![
            "Our store address is 12 Azadi Street in Tehran.".to_string(),
            "The premium plan costs 50 per month.".to_string(),
        ];
        let scores = scorer.score("what is your address", &docs).await.unwrap();

        assert_eq!(scores.len(), 2);
        assert!(scores[0] > scores[1]);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[tokio::test]
    async fn test_persian_query_against_persian_doc() {
        let scorer = LexicalScorer::new();
        let docs = vec![
            "آدرس فروشگاه ما: تهران، خیابان آزادی، پلاک ۱۲".to_string(),
            "ساعت کاری ما ۹ تا ۱۷ است".to_string(),
        ];
        let scores = scorer.score("ادرس شما کجاست", &docs).await.unwrap();
        assert!(scores[0] > scores[1]);
    }

    #[tokio::test]
    async fn test_no_terms_all_zero() {
        let scorer = LexicalScorer::new();
        let docs = vec!["something".to_string()];
        let scores = scorer.score("؟", &docs).await.unwrap();
        assert_eq!(scores, vec![0.0]);
    }

    #[test]
    fn test_tokenize_drops_short_words() {
        let terms = LexicalScorer::tokenize("Is it a good price");
        assert!(terms.contains(&"price".to_string()));
        assert!(terms.contains(&"good".to_string()));
        assert!(!terms.contains(&"a".to_string()));
    }

    #[test]
    fn test_create_scorer_backends() {
        let mut config = ScorerConfig::default();
        assert_eq!(create_scorer(&config).unwrap().name(), "lexical");

        config.backend = "http".to_string();
        assert_eq!(create_scorer(&config).unwrap().name(), "http");

        config.backend = "quantum".to_string();
        assert!(create_scorer(&config).is_err());
    }
}

//! Keyword-based intent routing
//!
//! Classifies a user query into an intent category by scanning global and
//! tenant-owned keyword sets over a folded form of the query. Pure and
//! side-effect-free once the keyword index snapshot is built: no storage or
//! network access at query time, and never an error — an unmatched query
//! degrades to the fallback intent.

mod normalize;

pub use normalize::*;

use crate::config::RouteConfig;
use crate::models::IntentKeyword;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

/// A keyword that matched the query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedKeyword {
    pub keyword: String,
    pub intent: String,
    pub weight: f64,
    pub tenant_owned: bool,
}

/// Routing decision for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    pub intent: String,
    /// Normalized confidence in [0, 1]
    pub confidence: f64,
    pub matched: Vec<MatchedKeyword>,
}

#[derive(Debug, Clone)]
struct IndexedKeyword {
    keyword: String,
    normalized: String,
    intent: String,
    /// Word count of the phrase; multi-word phrases outweigh single words
    word_count: usize,
    tenant_owned: bool,
}

/// Two-tier keyword snapshot: global rows merged with tenant rows, where a
/// tenant row shadows a global row with the same folded text and language.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    entries: Vec<IndexedKeyword>,
}

impl KeywordIndex {
    /// Build the index from the rows visible to one tenant (global plus
    /// tenant-owned, as loaded from storage).
    pub fn build(rows: &[IntentKeyword]) -> Self {
        let mut merged: BTreeMap<(String, String), IndexedKeyword> = BTreeMap::new();

        for row in rows {
            let key = (row.normalized.clone(), row.lang.clone());
            let entry = IndexedKeyword {
                keyword: row.keyword.clone(),
                normalized: row.normalized.clone(),
                intent: row.intent.clone(),
                word_count: row.normalized.unicode_words().count().max(1),
                tenant_owned: !row.is_global(),
            };
            match merged.get(&key) {
                // Tenant rows win over global rows for the same folded text
                Some(existing) if existing.tenant_owned && !entry.tenant_owned => {}
                _ => {
                    merged.insert(key, entry);
                }
            }
        }

        Self {
            entries: merged.into_values().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Keyword-matching query router
#[derive(Debug, Clone)]
pub struct QueryRouter {
    index: KeywordIndex,
    config: RouteConfig,
}

impl QueryRouter {
    pub fn new(index: KeywordIndex, config: RouteConfig) -> Self {
        Self { index, config }
    }

    /// Route a query to an intent. Deterministic for a fixed keyword
    /// configuration; never fails.
    pub fn route(&self, query: &str) -> RouteDecision {
        let folded = fold_text(query);
        if folded.is_empty() || self.index.is_empty() {
            return self.fallback();
        }

        let mut matched: Vec<MatchedKeyword> = Vec::new();
        // intent -> (total weight, tenant-contributed weight)
        let mut scores: BTreeMap<&str, (f64, f64)> = BTreeMap::new();

        for entry in &self.index.entries {
            if !folded.contains(&entry.normalized) {
                continue;
            }
            let specificity = if entry.tenant_owned {
                self.config.tenant_weight
            } else {
                1.0
            };
            let weight = entry.word_count as f64 * specificity;

            let slot = scores.entry(entry.intent.as_str()).or_insert((0.0, 0.0));
            slot.0 += weight;
            if entry.tenant_owned {
                slot.1 += weight;
            }

            matched.push(MatchedKeyword {
                keyword: entry.keyword.clone(),
                intent: entry.intent.clone(),
                weight,
                tenant_owned: entry.tenant_owned,
            });
        }

        // Winner: highest score, then largest tenant contribution; the
        // BTreeMap iteration order makes the final tie-break the
        // lexicographically first label (deterministic but arbitrary).
        let winner = scores.iter().fold(None::<(&str, (f64, f64))>, |best, (&intent, &s)| {
            match best {
                None => Some((intent, s)),
                Some((_, b)) if s.0 > b.0 || (s.0 == b.0 && s.1 > b.1) => Some((intent, s)),
                Some(b) => Some(b),
            }
        });

        let Some((intent, (score, _))) = winner else {
            return self.fallback();
        };

        matched.retain(|m| m.intent == intent);
        matched.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.keyword.cmp(&b.keyword))
        });

        let confidence = (score / self.config.saturation).min(1.0);
        debug!(
            "Routed query to intent '{}' (score {:.2}, confidence {:.2}, {} keyword(s))",
            intent,
            score,
            confidence,
            matched.len()
        );

        RouteDecision {
            intent: intent.to_string(),
            confidence,
            matched,
        }
    }

    fn fallback(&self) -> RouteDecision {
        RouteDecision {
            intent: self.config.fallback_intent.clone(),
            confidence: 0.0,
            matched: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn global(intent: &str, keyword: &str, lang: &str) -> IntentKeyword {
        IntentKeyword::new(None, intent, keyword, lang)
    }

    fn tenant(intent: &str, keyword: &str, lang: &str) -> IntentKeyword {
        IntentKeyword::new(Some("t1"), intent, keyword, lang)
    }

    fn router(rows: Vec<IntentKeyword>) -> QueryRouter {
        QueryRouter::new(KeywordIndex::build(&rows), Config::default().route)
    }

    #[test]
    fn test_no_match_falls_back() {
        let r = router(vec![global("pricing", "price", "en")]);
        let decision = r.route("do you deliver on weekends");

        assert_eq!(decision.intent, "general");
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.matched.is_empty());
    }

    #[test]
    fn test_basic_match() {
        let r = router(vec![
            global("pricing", "price", "en"),
            global("contact", "address", "en"),
        ]);
        let decision = r.route("What is the PRICE of this?");

        assert_eq!(decision.intent, "pricing");
        assert!(decision.confidence > 0.0);
        assert_eq!(decision.matched.len(), 1);
        assert!(!decision.matched[0].tenant_owned);
    }

    #[test]
    fn test_persian_suffix_matches() {
        let r = router(vec![
            global("contact", "ادرس", "fa"),
            global("pricing", "قیمت", "fa"),
        ]);
        let decision = r.route("ادرستون");

        assert_eq!(decision.intent, "contact");
        assert_eq!(decision.matched[0].keyword, "ادرس");
    }

    #[test]
    fn test_phrase_outweighs_single_word() {
        let r = router(vec![
            global("contact", "store", "en"),
            global("product", "store opening stock", "en"),
        ]);
        let decision = r.route("when is the store opening stock arriving");

        assert_eq!(decision.intent, "product");
    }

    #[test]
    fn test_tenant_keyword_weighted_higher() {
        // Same word count on both sides; the tenant row's specificity
        // multiplier breaks the tie
        let r = router(vec![
            global("pricing", "plan", "en"),
            tenant("product", "upgrade", "en"),
        ]);
        let decision = r.route("plan upgrade");

        assert_eq!(decision.intent, "product");
    }

    #[test]
    fn test_tenant_shadows_global_same_word() {
        let r = router(vec![
            global("pricing", "subscription", "en"),
            tenant("billing", "subscription", "en"),
        ]);
        let decision = r.route("cancel my subscription");

        assert_eq!(decision.intent, "billing");
        assert_eq!(decision.matched.len(), 1);
        assert!(decision.matched[0].tenant_owned);
    }

    #[test]
    fn test_exact_tie_lexicographic() {
        let r = router(vec![
            global("billing", "renew", "en"),
            global("pricing", "cost", "en"),
        ]);
        let decision = r.route("renew cost");

        // Equal weight, equal tenant contribution: first label wins
        assert_eq!(decision.intent, "billing");
    }

    #[test]
    fn test_confidence_saturates_at_one() {
        let r = router(vec![
            global("pricing", "price list for this", "en"),
            global("pricing", "price", "en"),
        ]);
        let decision = r.route("send me the price list for this");
        assert_eq!(decision.confidence, 1.0);
    }

    #[test]
    fn test_routing_deterministic() {
        let rows = vec![
            global("contact", "address", "en"),
            tenant("contact", "branch", "en"),
            global("pricing", "price", "en"),
        ];
        let r = router(rows);

        let a = r.route("address of your branch and price");
        let b = r.route("address of your branch and price");
        assert_eq!(a.intent, b.intent);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.matched.len(), b.matched.len());
    }
}

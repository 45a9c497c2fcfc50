//! Default values for configuration

/// Default relevance scorer backend ("lexical" or "http")
pub fn default_scorer_backend() -> String {
    "lexical".to_string()
}

/// Default scorer backend URL (embedding sidecar)
pub fn default_scorer_url() -> String {
    std::env::var("CONCIERGE_SCORER_URL").unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default embedding model served by the HTTP scorer backend
pub fn default_scorer_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}

/// Default: reranker disabled
pub fn default_reranker_enabled() -> bool {
    false
}

/// Default reranker backend URL
pub fn default_reranker_url() -> String {
    std::env::var("CONCIERGE_RERANKER_URL").unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default reranker model (cross-encoder)
pub fn default_reranker_model() -> String {
    "BAAI/bge-reranker-base".to_string()
}

/// Default maximum characters per chunk section
pub fn default_section_chars() -> usize {
    1200
}

/// Default minimum characters per chunk section
pub fn default_min_section_chars() -> usize {
    80
}

/// Default priority multiplier for user-corrected records
pub fn default_correction_boost() -> f64 {
    1.5
}

/// Default retry budget for insert races against concurrent chunkers
pub fn default_insert_retries() -> usize {
    3
}

/// Default intent when no keyword matches
pub fn default_fallback_intent() -> String {
    "general".to_string()
}

/// Default saturation constant for confidence normalization
pub fn default_saturation() -> f64 {
    3.0
}

/// Default weight multiplier for tenant-owned keywords
pub fn default_tenant_weight() -> f64 {
    1.5
}

/// Default keyword language code
pub fn default_keyword_lang() -> String {
    "fa".to_string()
}

/// Default primary context budget (characters)
pub fn default_primary_budget() -> usize {
    2400
}

/// Default secondary context budget (characters)
pub fn default_secondary_budget() -> usize {
    1200
}

/// Default minimum relevance score (0.0 disables the filter)
pub fn default_min_score() -> f32 {
    0.0
}

/// Default per-call retrieval timeout in seconds
pub fn default_retrieve_timeout() -> u64 {
    5
}

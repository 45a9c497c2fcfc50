//! Keywords command implementation
//!
//! Global keywords are seeded once per deployment; tenants layer their
//! own rows on top (which shadow global rows with the same folded text).

use crate::config::Config;
use crate::error::Result;
use crate::models::IntentKeyword;
use crate::store::KnowledgeDb;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Built-in global keyword set: (intent, keyword, lang)
const DEFAULT_KEYWORDS: &[(&str, &str, &str)] = &[
    ("contact", "address", "en"),
    ("contact", "phone number", "en"),
    ("contact", "ادرس", "fa"),
    ("contact", "شماره تماس", "fa"),
    ("pricing", "price", "en"),
    ("pricing", "how much", "en"),
    ("pricing", "قیمت", "fa"),
    ("pricing", "چنده", "fa"),
    ("shipping", "shipping", "en"),
    ("shipping", "delivery", "en"),
    ("shipping", "ارسال", "fa"),
    ("shipping", "پست", "fa"),
    ("hours", "opening hours", "en"),
    ("hours", "ساعت کاری", "fa"),
    ("returns", "return", "en"),
    ("returns", "refund", "en"),
    ("returns", "مرجوع", "fa"),
    ("returns", "بازگشت وجه", "fa"),
];

/// One row in a keyword seed file (JSONL)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRow {
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub intent: String,
    pub keyword: String,
    #[serde(default)]
    pub lang: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedStats {
    pub inserted: usize,
    pub skipped: usize,
}

/// Seed the built-in global keywords, plus an optional JSONL file of
/// extra rows. Idempotent; existing rows are skipped.
pub async fn cmd_seed_keywords(
    config: &Config,
    db: &KnowledgeDb,
    file: Option<&Path>,
) -> Result<SeedStats> {
    info!("Seeding intent keywords");
    let mut stats = SeedStats::default();

    for (intent, keyword, lang) in DEFAULT_KEYWORDS {
        let row = IntentKeyword::new(None, intent, keyword, lang);
        if db.insert_keyword(&row).await? {
            stats.inserted += 1;
        } else {
            stats.skipped += 1;
        }
    }

    if let Some(path) = file {
        let content = std::fs::read_to_string(path)?;
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let row: KeywordRow = serde_json::from_str(line)?;
            let lang = row.lang.as_deref().unwrap_or(&config.route.default_lang);
            let keyword = IntentKeyword::new(row.tenant_id.as_deref(), &row.intent, &row.keyword, lang);
            if db.insert_keyword(&keyword).await? {
                stats.inserted += 1;
            } else {
                stats.skipped += 1;
            }
        }
    }

    info!(
        "Seeded keywords: {} inserted, {} already present",
        stats.inserted, stats.skipped
    );
    Ok(stats)
}

/// Add a single keyword row
pub async fn cmd_add_keyword(
    config: &Config,
    db: &KnowledgeDb,
    tenant_id: Option<&str>,
    intent: &str,
    keyword: &str,
    lang: Option<&str>,
) -> Result<IntentKeyword> {
    let lang = lang.unwrap_or(&config.route.default_lang);
    let row = IntentKeyword::new(tenant_id, intent, keyword, lang);
    db.insert_keyword(&row).await?;
    Ok(row)
}

/// List keywords, optionally scoped to one tenant
pub async fn cmd_list_keywords(
    db: &KnowledgeDb,
    tenant_id: Option<&str>,
) -> Result<Vec<IntentKeyword>> {
    db.list_keywords(tenant_id).await
}

/// Print seed stats to console
pub fn print_seed_stats(stats: &SeedStats) {
    println!(
        "\n✓ Keywords seeded: {} inserted, {} already present",
        stats.inserted, stats.skipped
    );
}

/// Print keywords to console
pub fn print_keywords(keywords: &[IntentKeyword]) {
    println!("\n🏷  Intent keywords\n");

    if keywords.is_empty() {
        println!("No keywords. Run 'concierge keywords seed' to install defaults.");
        return;
    }

    for kw in keywords {
        let scope = kw.tenant_id.as_deref().unwrap_or("global");
        println!("• {} → {} [{}] ({})", kw.keyword, kw.intent, kw.lang, scope);
    }
}

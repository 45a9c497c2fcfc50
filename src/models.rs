//! Core domain types: knowledge chunks, intent keywords, source records.

use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Kinds of tenant knowledge a chunk can come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Faq,
    Manual,
    Product,
    Page,
}

impl ChunkKind {
    /// What happens to chunks when their source record is deleted.
    ///
    /// Manually curated content survives as an orphan (source link nulled);
    /// everything else is derived data and cascades away.
    pub fn delete_policy(&self) -> SourcePolicy {
        match self {
            ChunkKind::Manual => SourcePolicy::Orphan,
            _ => SourcePolicy::Cascade,
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkKind::Faq => write!(f, "faq"),
            ChunkKind::Manual => write!(f, "manual"),
            ChunkKind::Product => write!(f, "product"),
            ChunkKind::Page => write!(f, "page"),
        }
    }
}

impl FromStr for ChunkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "faq" => Ok(ChunkKind::Faq),
            "manual" => Ok(ChunkKind::Manual),
            "product" => Ok(ChunkKind::Product),
            "page" => Ok(ChunkKind::Page),
            _ => Err(Error::Validation(format!("Unknown chunk kind: {}", s))),
        }
    }
}

/// Policy for chunks whose source record goes away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePolicy {
    /// Delete the root chunk and all its children
    Cascade,
    /// Keep the content, null out the source link
    Orphan,
}

/// A retrievable unit of tenant content
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: String,
    pub tenant_id: String,
    pub kind: String,
    /// NULL means not tied to a single source (manually authored or orphaned)
    pub source_id: Option<String>,
    /// Groups multi-chunk documents; deterministic per (tenant, kind, source)
    pub doc_id: Option<String>,
    /// Set on child chunks, pointing at the root chunk of the document
    pub parent_id: Option<String>,
    pub position: i64,
    pub title: Option<String>,
    pub body: String,
    pub content_hash: String,
    pub priority: f64,
    pub user_corrected: bool,
    pub extra_json: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl KnowledgeChunk {
    /// Create a root chunk for a source record
    pub fn new_root(
        tenant_id: &str,
        kind: ChunkKind,
        source_id: &str,
        title: Option<String>,
        body: String,
        content_hash: String,
        priority: f64,
        user_corrected: bool,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            kind: kind.to_string(),
            source_id: Some(source_id.to_string()),
            doc_id: Some(document_id(tenant_id, kind, source_id)),
            parent_id: None,
            position: 0,
            title,
            body,
            content_hash,
            priority,
            user_corrected,
            extra_json: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Create a child chunk hanging off a root.
    ///
    /// Children carry no source_id of their own; the unique index on
    /// (tenant, source, kind) only guards the root.
    pub fn new_child(root: &KnowledgeChunk, position: i64, title: Option<String>, body: String) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: root.tenant_id.clone(),
            kind: root.kind.clone(),
            source_id: None,
            doc_id: root.doc_id.clone(),
            parent_id: Some(root.id.clone()),
            position,
            title,
            body,
            content_hash: root.content_hash.clone(),
            priority: root.priority,
            user_corrected: root.user_corrected,
            extra_json: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn get_kind(&self) -> Result<ChunkKind> {
        self.kind.parse()
    }

    /// Typed view over the metadata columns plus the open extension map
    pub fn metadata(&self) -> ChunkMetadata {
        let extra = self
            .extra_json
            .as_ref()
            .and_then(|j| serde_json::from_str(j).ok())
            .unwrap_or_default();
        ChunkMetadata {
            priority: self.priority,
            user_corrected: self.user_corrected,
            extra,
        }
    }

    /// Body length in Unicode scalar values (the budgeting unit)
    pub fn char_count(&self) -> usize {
        self.body.chars().count()
    }
}

/// Deterministic document id for the chunk set of one source record
pub fn document_id(tenant_id: &str, kind: ChunkKind, source_id: &str) -> String {
    let name = format!("{}/{}/{}", tenant_id, kind, source_id);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Typed chunk metadata: required fields as real values, everything else
/// in an explicit extension map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub priority: f64,
    pub user_corrected: bool,
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A knowledge-bearing record handed to the chunker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub tenant_id: String,
    pub source_id: String,
    pub kind: ChunkKind,
    #[serde(default)]
    pub title: Option<String>,
    pub text: String,
    #[serde(default)]
    pub lang: Option<String>,
    /// Set when a human edited the record after AI generation
    #[serde(default)]
    pub user_corrected: bool,
}

/// A routing signal row; tenant_id NULL means global/shared
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IntentKeyword {
    pub id: String,
    pub tenant_id: Option<String>,
    pub intent: String,
    /// Raw display form
    pub keyword: String,
    /// Folded matching form
    pub normalized: String,
    pub lang: String,
    pub created_at: String,
}

impl IntentKeyword {
    pub fn new(tenant_id: Option<&str>, intent: &str, keyword: &str, lang: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.map(String::from),
            intent: intent.to_string(),
            keyword: keyword.to_string(),
            normalized: crate::route::fold_text(keyword),
            lang: lang.to_string(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.tenant_id.is_none()
    }
}

/// Outcome of one chunker invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    /// Chunk set written for the first time
    Created,
    /// Source text changed; chunk set refreshed in place
    Updated,
    /// Content hash matched the stored set; nothing written
    Unchanged,
    /// Lost the insert race to a concurrent chunker and read its set back
    Recovered,
}

impl std::fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkStatus::Created => write!(f, "created"),
            ChunkStatus::Updated => write!(f, "updated"),
            ChunkStatus::Unchanged => write!(f, "unchanged"),
            ChunkStatus::Recovered => write!(f, "recovered"),
        }
    }
}

/// The chunk set a chunker call produced or found
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkOutcome {
    pub status: ChunkStatus,
    pub chunks: Vec<KnowledgeChunk>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [ChunkKind::Faq, ChunkKind::Manual, ChunkKind::Product, ChunkKind::Page] {
            let parsed: ChunkKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("invoice".parse::<ChunkKind>().is_err());
    }

    #[test]
    fn test_delete_policy() {
        assert_eq!(ChunkKind::Manual.delete_policy(), SourcePolicy::Orphan);
        assert_eq!(ChunkKind::Faq.delete_policy(), SourcePolicy::Cascade);
        assert_eq!(ChunkKind::Page.delete_policy(), SourcePolicy::Cascade);
    }

    #[test]
    fn test_document_id_deterministic() {
        let a = document_id("t1", ChunkKind::Faq, "faq-9");
        let b = document_id("t1", ChunkKind::Faq, "faq-9");
        let c = document_id("t2", ChunkKind::Faq, "faq-9");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_child_inherits_root() {
        let root = KnowledgeChunk::new_root(
            "t1",
            ChunkKind::Page,
            "page-1",
            Some("Shipping".to_string()),
            "lead".to_string(),
            "hash".to_string(),
            1.5,
            true,
        );
        let child = KnowledgeChunk::new_child(&root, 1, None, "section".to_string());

        assert_eq!(child.doc_id, root.doc_id);
        assert_eq!(child.parent_id.as_deref(), Some(root.id.as_str()));
        assert_eq!(child.source_id, None);
        assert_eq!(child.priority, 1.5);
        assert!(child.user_corrected);
    }

    #[test]
    fn test_metadata_view() {
        let mut chunk = KnowledgeChunk::new_root(
            "t1",
            ChunkKind::Faq,
            "faq-1",
            None,
            "body".to_string(),
            "hash".to_string(),
            2.0,
            true,
        );
        chunk.extra_json = Some(r#"{"campaign":"spring"}"#.to_string());

        let meta = chunk.metadata();
        assert_eq!(meta.priority, 2.0);
        assert!(meta.user_corrected);
        assert_eq!(meta.extra.get("campaign").and_then(|v| v.as_str()), Some("spring"));
    }
}

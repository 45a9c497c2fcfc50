//! SQLite schema definition

/// SQL schema for the knowledge database
pub const SCHEMA_SQL: &str = r#"
-- Knowledge chunks: retrievable units of tenant content
CREATE TABLE IF NOT EXISTS knowledge_chunks (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    source_id TEXT,
    doc_id TEXT,
    parent_id TEXT REFERENCES knowledge_chunks(id),
    position INTEGER NOT NULL DEFAULT 0,
    title TEXT,
    body TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    priority REAL NOT NULL DEFAULT 1.0,
    user_corrected INTEGER NOT NULL DEFAULT 0,
    extra_json TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- At most one root chunk per (tenant, source, kind). This index is the
-- optimistic concurrency gate: concurrent chunkers race on the insert and
-- the loser reads the winner's set back.
CREATE UNIQUE INDEX IF NOT EXISTS idx_chunks_source_once
    ON knowledge_chunks(tenant_id, source_id, kind)
    WHERE source_id IS NOT NULL;

-- Intent keywords: routing signals; tenant_id NULL is a global row
CREATE TABLE IF NOT EXISTS intent_keywords (
    id TEXT PRIMARY KEY,
    tenant_id TEXT,
    intent TEXT NOT NULL,
    keyword TEXT NOT NULL,
    normalized TEXT NOT NULL,
    lang TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_keywords_unique
    ON intent_keywords(COALESCE(tenant_id, ''), normalized, lang);

-- Indexes for the retrieval scan paths
CREATE INDEX IF NOT EXISTS idx_chunks_tenant_kind ON knowledge_chunks(tenant_id, kind);
CREATE INDEX IF NOT EXISTS idx_chunks_doc ON knowledge_chunks(doc_id);
CREATE INDEX IF NOT EXISTS idx_chunks_parent ON knowledge_chunks(parent_id);
CREATE INDEX IF NOT EXISTS idx_keywords_tenant ON intent_keywords(tenant_id);
"#;

//! Knowledge storage using SQLite
//!
//! This module handles all durable state:
//! - Knowledge chunks (roots and their children)
//! - Intent keywords (global and tenant-owned)
//! - Tenant and global statistics

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{ChunkKind, IntentKeyword, KnowledgeChunk, SourcePolicy};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

/// Result of attempting the root insert for a new chunk set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The whole set was written
    Inserted,
    /// A concurrent writer holds the (tenant, source, kind) slot
    DuplicateSource,
}

/// Knowledge database handle
#[derive(Clone)]
pub struct KnowledgeDb {
    pool: SqlitePool,
}

impl KnowledgeDb {
    /// Connect to the knowledge database
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    /// Open (and auto-initialize) the database at a path
    pub async fn new(db_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        if !db.is_initialized().await? {
            db.init_schema().await?;
        }
        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='knowledge_chunks'",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(result.is_some())
    }

    // ===== Chunk Operations =====

    /// Insert a root chunk and its children in one transaction.
    ///
    /// A unique violation on the root means another writer already chunked
    /// this source; the transaction is dropped and `DuplicateSource` is
    /// returned so the caller can read the existing set back.
    pub async fn insert_chunk_set(
        &self,
        root: &KnowledgeChunk,
        children: &[KnowledgeChunk],
    ) -> Result<InsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted = Self::insert_chunk_in(&mut tx, root).await;
        match inserted {
            Ok(()) => {}
            Err(Error::Database(sqlx::Error::Database(e)))
                if matches!(e.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                return Ok(InsertOutcome::DuplicateSource);
            }
            Err(e) => return Err(e),
        }

        for child in children {
            Self::insert_chunk_in(&mut tx, child).await?;
        }

        tx.commit().await?;
        Ok(InsertOutcome::Inserted)
    }

    async fn insert_chunk_in(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        chunk: &KnowledgeChunk,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO knowledge_chunks
                (id, tenant_id, kind, source_id, doc_id, parent_id, position, title, body,
                 content_hash, priority, user_corrected, extra_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.tenant_id)
        .bind(&chunk.kind)
        .bind(&chunk.source_id)
        .bind(&chunk.doc_id)
        .bind(&chunk.parent_id)
        .bind(chunk.position)
        .bind(&chunk.title)
        .bind(&chunk.body)
        .bind(&chunk.content_hash)
        .bind(chunk.priority)
        .bind(chunk.user_corrected)
        .bind(&chunk.extra_json)
        .bind(&chunk.created_at)
        .bind(&chunk.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Refresh a root chunk in place and replace its children in one transaction
    pub async fn update_chunk_set(
        &self,
        root: &KnowledgeChunk,
        children: &[KnowledgeChunk],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE knowledge_chunks SET
                title = ?, body = ?, content_hash = ?, priority = ?,
                user_corrected = ?, extra_json = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&root.title)
        .bind(&root.body)
        .bind(&root.content_hash)
        .bind(root.priority)
        .bind(root.user_corrected)
        .bind(&root.extra_json)
        .bind(Utc::now().to_rfc3339())
        .bind(&root.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM knowledge_chunks WHERE parent_id = ?")
            .bind(&root.id)
            .execute(&mut *tx)
            .await?;

        for child in children {
            Self::insert_chunk_in(&mut tx, child).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get the root chunk for a source record, if chunked
    pub async fn get_root_chunk(
        &self,
        tenant_id: &str,
        source_id: &str,
        kind: ChunkKind,
    ) -> Result<Option<KnowledgeChunk>> {
        let chunk = sqlx::query_as::<_, KnowledgeChunk>(
            "SELECT * FROM knowledge_chunks WHERE tenant_id = ? AND source_id = ? AND kind = ?",
        )
        .bind(tenant_id)
        .bind(source_id)
        .bind(kind.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(chunk)
    }

    /// Get a root chunk and its children, ordered by position
    pub async fn get_chunk_set(&self, root: &KnowledgeChunk) -> Result<Vec<KnowledgeChunk>> {
        let mut set = vec![root.clone()];
        let children = sqlx::query_as::<_, KnowledgeChunk>(
            "SELECT * FROM knowledge_chunks WHERE parent_id = ? ORDER BY position",
        )
        .bind(&root.id)
        .fetch_all(&self.pool)
        .await?;
        set.extend(children);
        Ok(set)
    }

    /// Ordered scan of all chunks for a tenant and kind
    pub async fn list_chunks(&self, tenant_id: &str, kind: ChunkKind) -> Result<Vec<KnowledgeChunk>> {
        let chunks = sqlx::query_as::<_, KnowledgeChunk>(
            r#"
            SELECT * FROM knowledge_chunks
            WHERE tenant_id = ? AND kind = ?
            ORDER BY doc_id, position
            "#,
        )
        .bind(tenant_id)
        .bind(kind.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }

    /// Get a chunk by id
    pub async fn get_chunk(&self, id: &str) -> Result<Option<KnowledgeChunk>> {
        let chunk =
            sqlx::query_as::<_, KnowledgeChunk>("SELECT * FROM knowledge_chunks WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(chunk)
    }

    /// Remove the chunk set for a deleted source record.
    ///
    /// Cascade deletes root and children; orphan keeps the rows but nulls
    /// the root's source link, freeing the uniqueness slot.
    pub async fn delete_for_source(
        &self,
        tenant_id: &str,
        source_id: &str,
        kind: ChunkKind,
        policy: SourcePolicy,
    ) -> Result<usize> {
        let Some(root) = self.get_root_chunk(tenant_id, source_id, kind).await? else {
            return Ok(0);
        };

        match policy {
            SourcePolicy::Cascade => {
                let mut tx = self.pool.begin().await?;
                let children = sqlx::query("DELETE FROM knowledge_chunks WHERE parent_id = ?")
                    .bind(&root.id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM knowledge_chunks WHERE id = ?")
                    .bind(&root.id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(children.rows_affected() as usize + 1)
            }
            SourcePolicy::Orphan => {
                sqlx::query(
                    "UPDATE knowledge_chunks SET source_id = NULL, updated_at = ? WHERE id = ?",
                )
                .bind(Utc::now().to_rfc3339())
                .bind(&root.id)
                .execute(&self.pool)
                .await?;
                Ok(0)
            }
        }
    }

    // ===== Keyword Operations =====

    /// Insert a keyword; duplicates (same tenant, normalized form, lang)
    /// are ignored so seeding stays idempotent.
    pub async fn insert_keyword(&self, keyword: &IntentKeyword) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO intent_keywords
                (id, tenant_id, intent, keyword, normalized, lang, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&keyword.id)
        .bind(&keyword.tenant_id)
        .bind(&keyword.intent)
        .bind(&keyword.keyword)
        .bind(&keyword.normalized)
        .bind(&keyword.lang)
        .bind(&keyword.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Load the keyword rows visible to a tenant: global rows plus the
    /// tenant's own. Precedence between them is the router's concern.
    pub async fn load_keywords(&self, tenant_id: &str) -> Result<Vec<IntentKeyword>> {
        let keywords = sqlx::query_as::<_, IntentKeyword>(
            r#"
            SELECT * FROM intent_keywords
            WHERE tenant_id IS NULL OR tenant_id = ?
            ORDER BY intent, normalized
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(keywords)
    }

    /// List keywords, optionally scoped to one tenant (global rows included)
    pub async fn list_keywords(&self, tenant_id: Option<&str>) -> Result<Vec<IntentKeyword>> {
        match tenant_id {
            Some(t) => self.load_keywords(t).await,
            None => {
                let keywords = sqlx::query_as::<_, IntentKeyword>(
                    "SELECT * FROM intent_keywords ORDER BY intent, normalized",
                )
                .fetch_all(&self.pool)
                .await?;
                Ok(keywords)
            }
        }
    }

    // ===== Statistics =====

    /// Per-tenant chunk counts by kind
    pub async fn get_tenant_stats(&self, tenant_id: &str) -> Result<TenantStats> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT kind, COUNT(*) FROM knowledge_chunks WHERE tenant_id = ? GROUP BY kind",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let keyword_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM intent_keywords WHERE tenant_id = ?")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?;

        let mut stats = TenantStats {
            tenant_id: tenant_id.to_string(),
            chunk_count: 0,
            chunks_by_kind: Vec::new(),
            keyword_count: keyword_count as usize,
        };
        for (kind, count) in rows {
            stats.chunk_count += count as usize;
            stats.chunks_by_kind.push(KindCount {
                kind,
                count: count as usize,
            });
        }
        Ok(stats)
    }

    /// Global statistics across all tenants
    pub async fn get_global_stats(&self) -> Result<GlobalStats> {
        let tenant_count: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT tenant_id) FROM knowledge_chunks")
                .fetch_one(&self.pool)
                .await?;

        let chunk_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_chunks")
            .fetch_one(&self.pool)
            .await?;

        let keyword_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM intent_keywords")
            .fetch_one(&self.pool)
            .await?;

        let global_keyword_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM intent_keywords WHERE tenant_id IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(GlobalStats {
            tenant_count: tenant_count as usize,
            chunk_count: chunk_count as usize,
            keyword_count: keyword_count as usize,
            global_keyword_count: global_keyword_count as usize,
        })
    }
}

/// Statistics for a single tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantStats {
    pub tenant_id: String,
    pub chunk_count: usize,
    pub chunks_by_kind: Vec<KindCount>,
    pub keyword_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindCount {
    pub kind: String,
    pub count: usize,
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub tenant_count: usize,
    pub chunk_count: usize,
    pub keyword_count: usize,
    pub global_keyword_count: usize,
}

//! Incremental chunking of source records
//!
//! Converts one knowledge-bearing record into a chunk set: a single root
//! chunk for short records, a root plus child sections for long ones.
//! Exactly-once semantics per (tenant, source, kind) come from the storage
//! uniqueness index, not from locks: a writer that loses the insert race
//! reads the winner's set back and reports it as recovered.

mod boundaries;

pub use boundaries::*;

use crate::config::ChunkConfig;
use crate::error::{Error, Result};
use crate::models::{ChunkOutcome, ChunkStatus, KnowledgeChunk, SourceRecord};
use crate::parse::{prepare_content, ContentFormat, PreparedContent};
use crate::store::{InsertOutcome, KnowledgeDb};
use tracing::{debug, info};

/// Default priority for freshly chunked content
pub const DEFAULT_PRIORITY: f64 = 1.0;

/// A section carved out of a long record
#[derive(Debug, Clone)]
struct Section {
    title: Option<String>,
    body: String,
}

/// Incremental chunker
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// Chunk a source record. Idempotent: an unchanged record returns the
    /// stored set, a changed one is refreshed in place, and a concurrent
    /// duplicate invocation recovers the winner's set.
    pub async fn chunk(&self, db: &KnowledgeDb, record: &SourceRecord) -> Result<ChunkOutcome> {
        if record.text.trim().is_empty() {
            return Err(Error::Validation(format!(
                "Source record {}/{} has no text",
                record.tenant_id, record.source_id
            )));
        }

        let format = ContentFormat::for_kind(record.kind);
        let prepared = prepare_content(&record.text, format)?;
        if prepared.text.is_empty() {
            return Err(Error::Validation(format!(
                "Source record {}/{} has no extractable text",
                record.tenant_id, record.source_id
            )));
        }

        let content_hash = compute_text_hash(&prepared.text);
        let priority = if record.user_corrected {
            DEFAULT_PRIORITY * self.config.correction_boost
        } else {
            DEFAULT_PRIORITY
        };

        for attempt in 0..=self.config.insert_retries {
            if let Some(existing) = db
                .get_root_chunk(&record.tenant_id, &record.source_id, record.kind)
                .await?
            {
                if existing.content_hash == content_hash
                    && existing.user_corrected == record.user_corrected
                {
                    debug!(
                        "Source {}/{} unchanged, keeping existing chunk set",
                        record.tenant_id, record.source_id
                    );
                    return Ok(ChunkOutcome {
                        status: ChunkStatus::Unchanged,
                        chunks: db.get_chunk_set(&existing).await?,
                    });
                }

                let (mut root, children) = self.build_chunks(record, &prepared, &content_hash, priority);
                // Refresh in place: the root keeps its identity and doc id
                root.id = existing.id.clone();
                root.doc_id = existing.doc_id.clone();
                root.created_at = existing.created_at.clone();
                let children: Vec<KnowledgeChunk> = children
                    .into_iter()
                    .map(|mut c| {
                        c.parent_id = Some(root.id.clone());
                        c.doc_id = root.doc_id.clone();
                        c
                    })
                    .collect();
                db.update_chunk_set(&root, &children).await?;
                info!(
                    "Refreshed chunk set for {}/{} ({} chunks)",
                    record.tenant_id,
                    record.source_id,
                    children.len() + 1
                );
                return Ok(ChunkOutcome {
                    status: ChunkStatus::Updated,
                    chunks: db.get_chunk_set(&root).await?,
                });
            }

            let (root, children) = self.build_chunks(record, &prepared, &content_hash, priority);
            match db.insert_chunk_set(&root, &children).await? {
                InsertOutcome::Inserted => {
                    info!(
                        "Chunked {}/{} into {} chunk(s)",
                        record.tenant_id,
                        record.source_id,
                        children.len() + 1
                    );
                    return Ok(ChunkOutcome {
                        status: ChunkStatus::Created,
                        chunks: db.get_chunk_set(&root).await?,
                    });
                }
                InsertOutcome::DuplicateSource => {
                    // Another writer won the race; its set is the truth
                    if let Some(winner) = db
                        .get_root_chunk(&record.tenant_id, &record.source_id, record.kind)
                        .await?
                    {
                        debug!(
                            "Lost chunk race for {}/{}, recovered existing set",
                            record.tenant_id, record.source_id
                        );
                        return Ok(ChunkOutcome {
                            status: ChunkStatus::Recovered,
                            chunks: db.get_chunk_set(&winner).await?,
                        });
                    }
                    // Winner was deleted before we could read it back
                    debug!(
                        "Chunk race for {}/{} left no row, retrying (attempt {})",
                        record.tenant_id, record.source_id, attempt
                    );
                }
            }
        }

        Err(Error::Conflict(format!(
            "Gave up chunking {}/{} after {} insert retries",
            record.tenant_id, record.source_id, self.config.insert_retries
        )))
    }

    /// Build the root and child chunks for a record
    fn build_chunks(
        &self,
        record: &SourceRecord,
        prepared: &PreparedContent,
        content_hash: &str,
        priority: f64,
    ) -> (KnowledgeChunk, Vec<KnowledgeChunk>) {
        let title = prepared.title.clone().or_else(|| record.title.clone());
        let sections = self.split_sections(prepared);

        let mut iter = sections.into_iter();
        let lead = iter.next().unwrap_or_else(|| Section {
            title: None,
            body: prepared.text.clone(),
        });

        let root = KnowledgeChunk::new_root(
            &record.tenant_id,
            record.kind,
            &record.source_id,
            lead.title.or(title),
            lead.body,
            content_hash.to_string(),
            priority,
            record.user_corrected,
        );

        let children = iter
            .enumerate()
            .map(|(i, section)| {
                KnowledgeChunk::new_child(&root, (i + 1) as i64, section.title, section.body)
            })
            .collect();

        (root, children)
    }

    /// Split prepared text into sections at heading/paragraph/sentence
    /// boundaries. Short records yield a single section.
    fn split_sections(&self, prepared: &PreparedContent) -> Vec<Section> {
        let text = &prepared.text;
        if text.chars().count() <= self.config.section_chars {
            return vec![Section {
                title: prepared.title.clone(),
                body: text.clone(),
            }];
        }

        let break_points = find_break_points(text, &prepared.headings);
        let mut sections: Vec<Section> = Vec::new();
        let mut start = 0;

        while start < text.len() {
            let target = byte_offset_after_chars(text, start, self.config.section_chars);
            let end = if target >= text.len() {
                text.len()
            } else {
                let min_pos = byte_offset_after_chars(text, start, self.config.min_section_chars);
                find_best_break(text, min_pos, target, &break_points)
            };

            let end = ensure_char_boundary(text, end.max(start + 1)).max(start + 1);
            let body = text[start..end.min(text.len())].trim().to_string();

            if !body.is_empty() {
                let title = heading_for_span(prepared, start, end);
                sections.push(Section { title, body });
            }

            if end >= text.len() {
                break;
            }
            start = end;
        }

        // Don't leave a tiny trailing section behind
        if sections.len() > 1 {
            let last_len = sections[sections.len() - 1].body.chars().count();
            if last_len < self.config.min_section_chars {
                if let Some(last) = sections.pop() {
                    if let Some(prev) = sections.last_mut() {
                        prev.body.push_str("\n\n");
                        prev.body.push_str(&last.body);
                    }
                }
            }
        }

        sections
    }
}

/// Byte offset of the position `n_chars` characters past `start`
fn byte_offset_after_chars(text: &str, start: usize, n_chars: usize) -> usize {
    text[start..]
        .char_indices()
        .nth(n_chars)
        .map(|(i, _)| start + i)
        .unwrap_or(text.len())
}

/// The innermost heading covering a section span, if any
fn heading_for_span(prepared: &PreparedContent, start: usize, end: usize) -> Option<String> {
    prepared
        .headings
        .iter()
        .rev()
        .find(|h| h.position < end && h.position >= start)
        .or_else(|| prepared.headings.iter().rev().find(|h| h.position < start))
        .map(|h| h.text.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::ChunkKind;
    use tempfile::TempDir;

    async fn setup() -> (Chunker, KnowledgeDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = KnowledgeDb::new(&tmp.path().join("test.db")).await.unwrap();
        let chunker = Chunker::new(Config::default().chunk);
        (chunker, db, tmp)
    }

    fn faq_record(tenant: &str, source: &str, text: &str) -> SourceRecord {
        SourceRecord {
            tenant_id: tenant.to_string(),
            source_id: source.to_string(),
            kind: ChunkKind::Faq,
            title: Some("Address".to_string()),
            text: text.to_string(),
            lang: Some("fa".to_string()),
            user_corrected: false,
        }
    }

    #[tokio::test]
    async fn test_empty_record_rejected() {
        let (chunker, db, _tmp) = setup().await;
        let record = faq_record("t1", "faq-1", "   \n  ");
        let err = chunker.chunk(&db, &record).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_short_record_single_chunk() {
        let (chunker, db, _tmp) = setup().await;
        let record = faq_record("t1", "faq-1", "Our address is 12 Azadi St, Tehran.");

        let outcome = chunker.chunk(&db, &record).await.unwrap();
        assert_eq!(outcome.status, ChunkStatus::Created);
        assert_eq!(outcome.chunks.len(), 1);
        assert_eq!(outcome.chunks[0].position, 0);
        assert_eq!(outcome.chunks[0].priority, 1.0);
        assert!(!outcome.chunks[0].user_corrected);
        assert_eq!(outcome.chunks[0].source_id.as_deref(), Some("faq-1"));
    }

    #[tokio::test]
    async fn test_long_record_splits_into_children() {
        let (chunker, db, _tmp) = setup().await;
        let mut record = faq_record("t1", "man-1", "");
        record.kind = ChunkKind::Manual;
        record.text = format!(
            "# Guide\n\n{}\n\n## Part Two\n\n{}",
            "Setup steps explained in detail here. ".repeat(40),
            "Troubleshooting advice repeated for length. ".repeat(40),
        );

        let outcome = chunker.chunk(&db, &record).await.unwrap();
        assert_eq!(outcome.status, ChunkStatus::Created);
        assert!(outcome.chunks.len() > 1);

        let root = &outcome.chunks[0];
        assert_eq!(root.position, 0);
        assert!(root.doc_id.is_some());
        for (i, child) in outcome.chunks[1..].iter().enumerate() {
            assert_eq!(child.position, (i + 1) as i64);
            assert_eq!(child.parent_id.as_deref(), Some(root.id.as_str()));
            assert_eq!(child.doc_id, root.doc_id);
            assert_eq!(child.source_id, None);
        }
    }

    #[tokio::test]
    async fn test_idempotent_rechunk() {
        let (chunker, db, _tmp) = setup().await;
        let record = faq_record("t1", "faq-1", "Our address is 12 Azadi St, Tehran.");

        let first = chunker.chunk(&db, &record).await.unwrap();
        let second = chunker.chunk(&db, &record).await.unwrap();

        assert_eq!(second.status, ChunkStatus::Unchanged);
        assert_eq!(first.chunks.len(), second.chunks.len());
        assert_eq!(first.chunks[0].id, second.chunks[0].id);
        assert_eq!(first.chunks[0].body, second.chunks[0].body);
    }

    #[tokio::test]
    async fn test_correction_boosts_priority() {
        let (chunker, db, _tmp) = setup().await;
        let mut record = faq_record("t1", "faq-1", "Our address is 12 Azadi St, Tehran.");

        let created = chunker.chunk(&db, &record).await.unwrap();
        assert_eq!(created.chunks[0].priority, 1.0);
        let root_id = created.chunks[0].id.clone();

        record.text = "Our address is 14 Azadi St, Tehran (updated).".to_string();
        record.user_corrected = true;
        let updated = chunker.chunk(&db, &record).await.unwrap();

        assert_eq!(updated.status, ChunkStatus::Updated);
        assert_eq!(updated.chunks[0].id, root_id);
        assert!(updated.chunks[0].user_corrected);
        assert!(updated.chunks[0].priority > 1.0);
        assert!(updated.chunks[0].body.contains("14 Azadi"));

        let meta = updated.chunks[0].metadata();
        assert!(meta.user_corrected);
        assert!(meta.priority > 1.0);
    }

    #[tokio::test]
    async fn test_concurrent_chunking_single_winner() {
        let (chunker, db, _tmp) = setup().await;
        let record = faq_record("t1", "faq-1", "Our address is 12 Azadi St, Tehran.");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let chunker = chunker.clone();
            let db = db.clone();
            let record = record.clone();
            handles.push(tokio::spawn(async move { chunker.chunk(&db, &record).await }));
        }

        let mut created = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            match outcome.status {
                ChunkStatus::Created => created += 1,
                ChunkStatus::Recovered | ChunkStatus::Unchanged => {}
                ChunkStatus::Updated => panic!("no update expected"),
            }
            assert_eq!(outcome.chunks.len(), 1);
        }
        assert_eq!(created, 1);

        // Exactly one persisted set
        let chunks = db.list_chunks("t1", ChunkKind::Faq).await.unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_page_record_html_extracted() {
        let (chunker, db, _tmp) = setup().await;
        let mut record = faq_record("t1", "page-1", "");
        record.kind = ChunkKind::Page;
        record.text =
            "<html><head><title>Contact</title></head><body><p>Call us at 021-555.</p></body></html>"
                .to_string();

        let outcome = chunker.chunk(&db, &record).await.unwrap();
        assert_eq!(outcome.chunks[0].title.as_deref(), Some("Contact"));
        assert!(outcome.chunks[0].body.contains("021-555"));
        assert!(!outcome.chunks[0].body.contains("<p>"));
    }
}

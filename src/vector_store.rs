//! Dual-collection vector index.
//!
//! Two collections share one embedding provider:
//!
//! | Collection | Key | Embedded text | Used for |
//! |------------|-----|---------------|----------|
//! | `catalog` | course title | course title | fuzzy course-name resolution |
//! | `content` | `{title}_{chunk_index}` | chunk text | content search |
//!
//! A search with a course name first resolves it against the catalog
//! (nearest neighbor), then filters the content query by the resolved
//! title and, optionally, a lesson number.
//!
//! Every write is an overwrite keyed by id, so re-indexing a course is
//! idempotent. Content records carry a SHA-256 of their text and are
//! re-embedded only when it changes.

use std::sync::Arc;

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::{RagError, RagResult};
use crate::models::{
    CatalogEntry, ChunkMetadata, Course, CourseChunk, LessonSummary, SearchHit, SearchResults,
};
use crate::store::{self, Collection, Filter, Record};

pub struct VectorIndex {
    catalog: Arc<dyn Collection>,
    content: Arc<dyn Collection>,
    embedder: Arc<dyn EmbeddingProvider>,
    max_results: usize,
    min_course_similarity: Option<f32>,
}

impl VectorIndex {
    pub fn new(
        catalog: Arc<dyn Collection>,
        content: Arc<dyn Collection>,
        embedder: Arc<dyn EmbeddingProvider>,
        max_results: usize,
    ) -> Self {
        Self {
            catalog,
            content,
            embedder,
            max_results: max_results.max(1),
            min_course_similarity: None,
        }
    }

    /// Reject course-name matches whose cosine similarity is below
    /// `threshold`. `None` accepts the nearest catalog entry whatever its
    /// score.
    pub fn with_min_course_similarity(mut self, threshold: Option<f32>) -> Self {
        self.min_course_similarity = threshold;
        self
    }

    /// Open the configured backend.
    pub async fn open(config: &Config, embedder: Arc<dyn EmbeddingProvider>) -> RagResult<Self> {
        let (catalog, content) = store::open_collections(config)
            .await
            .map_err(RagError::index)?;
        Ok(Self::new(catalog, content, embedder, config.retrieval.max_results)
            .with_min_course_similarity(config.retrieval.min_course_similarity))
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    // ═══════════════════════════════════════════════════════════════════
    // Writes
    // ═══════════════════════════════════════════════════════════════════

    /// Write or overwrite the catalog entry for `course`.
    pub async fn upsert_course(&self, course: &Course) -> RagResult<()> {
        let entry = CatalogEntry::from(course);
        let lessons_json = serde_json::to_string(&entry.lessons).map_err(RagError::index)?;
        let metadata = json!({
            "title": entry.title,
            "instructor": entry.instructor,
            "course_link": entry.course_link,
            "lessons_json": lessons_json,
        });
        let record = Record {
            id: course.title.clone(),
            text: course.title.clone(),
            hash: content_hash(&format!("{}\n{}", course.title, metadata)),
            metadata,
        };

        let vector = embed_query(self.embedder.as_ref(), &record.text)
            .await
            .map_err(RagError::index)?;
        self.catalog
            .upsert(&[record], &[vector])
            .await
            .map_err(RagError::index)?;
        tracing::debug!(course = %course.title, "catalog entry written");
        Ok(())
    }

    /// Write content records for `chunks`. Returns how many were embedded;
    /// chunks whose stored text hash is unchanged are skipped.
    pub async fn upsert_chunks(&self, chunks: &[CourseChunk]) -> RagResult<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = chunks.iter().map(CourseChunk::record_id).collect();
        let existing = self.content.hashes(&ids).await.map_err(RagError::index)?;

        let records: Vec<Record> = chunks
            .iter()
            .zip(ids)
            .map(|(chunk, id)| Record {
                id,
                text: chunk.content.clone(),
                metadata: json!({
                    "course_title": chunk.course_title,
                    "lesson_number": chunk.lesson_number,
                    "chunk_index": chunk.chunk_index,
                }),
                hash: content_hash(&chunk.content),
            })
            .filter(|r| existing.get(&r.id) != Some(&r.hash))
            .collect();

        if records.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(RagError::index)?;
        self.content
            .upsert(&records, &vectors)
            .await
            .map_err(RagError::index)?;

        tracing::debug!(
            embedded = records.len(),
            skipped = chunks.len() - records.len(),
            "content records written"
        );
        Ok(records.len())
    }

    /// Drop both collections.
    pub async fn clear(&self) -> RagResult<()> {
        self.catalog.clear().await.map_err(RagError::index)?;
        self.content.clear().await.map_err(RagError::index)?;
        tracing::info!("index cleared");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Reads
    // ═══════════════════════════════════════════════════════════════════

    /// Resolve a partial or approximate course name to a catalog title.
    pub async fn resolve_course_name(&self, fuzzy: &str) -> RagResult<String> {
        let vector = embed_query(self.embedder.as_ref(), fuzzy)
            .await
            .map_err(RagError::index)?;
        let best = self
            .catalog
            .query(&vector, 1, None)
            .await
            .map_err(RagError::index)?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::NotFound(fuzzy.to_string()))?;

        if let Some(threshold) = self.min_course_similarity {
            if best.similarity < threshold {
                tracing::debug!(
                    query = fuzzy,
                    best = %best.record.id,
                    similarity = best.similarity,
                    "course match below threshold"
                );
                return Err(RagError::NotFound(fuzzy.to_string()));
            }
        }

        Ok(best.record.id)
    }

    /// Semantic search over course content.
    ///
    /// With a `course_name`, resolves it first; an unresolvable name yields
    /// an empty result carrying `"No course found matching '{name}'"` and
    /// the content collection is not queried. `limit` defaults to the
    /// configured maximum.
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<i64>,
        limit: Option<usize>,
    ) -> RagResult<SearchResults> {
        let course_title = match course_name {
            Some(name) => match self.resolve_course_name(name).await {
                Ok(title) => Some(title),
                Err(e @ RagError::NotFound(_)) => return Ok(SearchResults::empty(e.to_string())),
                Err(e) => return Err(e),
            },
            None => None,
        };

        let filter = build_filter(course_title.as_deref(), lesson_number);
        let vector = embed_query(self.embedder.as_ref(), query)
            .await
            .map_err(RagError::index)?;
        let scored = self
            .content
            .query(&vector, limit.unwrap_or(self.max_results), filter.as_ref())
            .await
            .map_err(RagError::index)?;

        let hits = scored
            .into_iter()
            .map(|s| {
                let metadata: ChunkMetadata =
                    serde_json::from_value(s.record.metadata).map_err(RagError::index)?;
                Ok(SearchHit {
                    document: s.record.text,
                    metadata,
                    distance: 1.0 - s.similarity,
                })
            })
            .collect::<RagResult<Vec<_>>>()?;

        Ok(SearchResults { hits, error: None })
    }

    /// Catalog metadata for an exact title.
    pub async fn catalog_entry(&self, title: &str) -> RagResult<Option<CatalogEntry>> {
        let record = self.catalog.get(title).await.map_err(RagError::index)?;
        record.map(|r| record_to_entry(&r)).transpose()
    }

    pub async fn course_link(&self, title: &str) -> RagResult<Option<String>> {
        Ok(self
            .catalog_entry(title)
            .await?
            .and_then(|entry| entry.course_link))
    }

    pub async fn lesson_link(&self, title: &str, lesson_number: i64) -> RagResult<Option<String>> {
        Ok(self.catalog_entry(title).await?.and_then(|entry| {
            entry
                .lessons
                .into_iter()
                .find(|l| l.lesson_number == lesson_number)
                .and_then(|l| l.lesson_link)
        }))
    }

    pub async fn course_count(&self) -> RagResult<usize> {
        self.catalog.count().await.map_err(RagError::index)
    }

    /// Every catalog title, sorted.
    pub async fn course_titles(&self) -> RagResult<Vec<String>> {
        let mut titles: Vec<String> = self
            .catalog
            .list()
            .await
            .map_err(RagError::index)?
            .into_iter()
            .map(|r| r.id)
            .collect();
        titles.sort();
        Ok(titles)
    }

    pub async fn content_count(&self) -> RagResult<usize> {
        self.content.count().await.map_err(RagError::index)
    }
}

/// No filter, one equality, or the conjunction of both.
fn build_filter(course_title: Option<&str>, lesson_number: Option<i64>) -> Option<Filter> {
    match (course_title, lesson_number) {
        (None, None) => None,
        (Some(title), None) => Some(Filter::eq("course_title", title)),
        (None, Some(n)) => Some(Filter::eq("lesson_number", n)),
        (Some(title), Some(n)) => Some(Filter::And(vec![
            Filter::eq("course_title", title),
            Filter::eq("lesson_number", n),
        ])),
    }
}

fn record_to_entry(record: &Record) -> RagResult<CatalogEntry> {
    let meta = &record.metadata;
    let text = |key: &str| meta.get(key).and_then(|v| v.as_str()).map(str::to_string);
    let lessons: Vec<LessonSummary> = match meta.get("lessons_json").and_then(|v| v.as_str()) {
        Some(raw) => serde_json::from_str(raw).map_err(RagError::index)?,
        None => Vec::new(),
    };
    Ok(CatalogEntry {
        title: text("title").unwrap_or_else(|| record.id.clone()),
        instructor: text("instructor"),
        course_link: text("course_link"),
        lessons,
    })
}

fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashProvider;
    use crate::models::Lesson;
    use crate::store::memory::InMemoryCollection;

    fn index() -> VectorIndex {
        VectorIndex::new(
            Arc::new(InMemoryCollection::new("catalog")),
            Arc::new(InMemoryCollection::new("content")),
            Arc::new(HashProvider::new(256)),
            5,
        )
    }

    fn course(title: &str) -> Course {
        Course {
            title: title.to_string(),
            course_link: Some(format!("https://example.com/{}", title.len())),
            instructor: Some("Instructor".to_string()),
            lessons: vec![Lesson {
                lesson_number: 1,
                title: "Intro".to_string(),
                lesson_link: Some("https://example.com/l1".to_string()),
                body: String::new(),
            }],
        }
    }

    fn chunk(title: &str, lesson: i64, index: i64, content: &str) -> CourseChunk {
        CourseChunk {
            course_title: title.to_string(),
            lesson_number: Some(lesson),
            chunk_index: index,
            content: content.to_string(),
        }
    }

    #[test]
    fn filter_shapes() {
        assert_eq!(build_filter(None, None), None);
        assert_eq!(
            build_filter(Some("A"), None),
            Some(Filter::eq("course_title", "A"))
        );
        assert_eq!(build_filter(None, Some(2)), Some(Filter::eq("lesson_number", 2)));
        assert!(matches!(build_filter(Some("A"), Some(2)), Some(Filter::And(f)) if f.len() == 2));
    }

    #[tokio::test]
    async fn empty_catalog_resolves_to_not_found() {
        let idx = index();
        assert!(matches!(
            idx.resolve_course_name("anything").await,
            Err(RagError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unresolved_course_returns_error_result() {
        let idx = index();
        let results = idx.search("agents", Some("Nope"), None, None).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(
            results.error.as_deref(),
            Some("No course found matching 'Nope'")
        );
    }

    #[tokio::test]
    async fn threshold_rejects_weak_matches() {
        let idx = index().with_min_course_similarity(Some(0.99));
        idx.upsert_course(&course("Advanced Retrieval for AI with Chroma"))
            .await
            .unwrap();
        assert!(matches!(
            idx.resolve_course_name("MCP servers").await,
            Err(RagError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unchanged_chunks_are_not_re_embedded() {
        let idx = index();
        let chunks = vec![chunk("C", 1, 0, "Alpha."), chunk("C", 1, 1, "Beta.")];
        assert_eq!(idx.upsert_chunks(&chunks).await.unwrap(), 2);
        assert_eq!(idx.upsert_chunks(&chunks).await.unwrap(), 0);

        let changed = vec![chunk("C", 1, 0, "Alpha."), chunk("C", 1, 1, "Gamma.")];
        assert_eq!(idx.upsert_chunks(&changed).await.unwrap(), 1);
        assert_eq!(idx.content_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn links_come_from_the_catalog() {
        let idx = index();
        let c = course("Prompt Compression");
        idx.upsert_course(&c).await.unwrap();
        assert_eq!(
            idx.lesson_link("Prompt Compression", 1).await.unwrap().as_deref(),
            Some("https://example.com/l1")
        );
        assert_eq!(idx.lesson_link("Prompt Compression", 9).await.unwrap(), None);
        assert_eq!(idx.course_link("Prompt Compression").await.unwrap(), c.course_link);
        assert_eq!(idx.course_titles().await.unwrap(), vec!["Prompt Compression"]);
    }

    #[tokio::test]
    async fn search_reports_distance_ascending() {
        let idx = index();
        idx.upsert_chunks(&[
            chunk("C", 1, 0, "Tool use lets the model call functions."),
            chunk("C", 1, 1, "Vector databases store embeddings."),
        ])
        .await
        .unwrap();
        let results = idx.search("tool use functions", None, None, None).await.unwrap();
        assert_eq!(results.hits.len(), 2);
        assert!(results.hits[0].distance <= results.hits[1].distance);
        assert_eq!(results.hits[0].metadata.chunk_index, 0);
    }
}

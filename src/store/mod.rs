//! Storage abstraction for the vector index.
//!
//! A [`Collection`] is one independently keyed set of embedded records.
//! The index keeps two of them (`catalog` and `content`) that share an
//! embedding provider but are stored, queried, and cleared separately.
//!
//! Backends:
//!
//! | Backend | Type | Notes |
//! |---------|------|-------|
//! | `memory` | [`memory::InMemoryCollection`] | `RwLock<HashMap>`, lost at exit |
//! | `sqlite` | [`sqlite::SqliteCollection`] | one table, vectors as `f32` BLOBs |
//!
//! Both perform brute-force cosine similarity over every stored vector.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;
use crate::{db, migrate};

/// Name of the course metadata collection.
pub const CATALOG: &str = "catalog";
/// Name of the chunk collection.
pub const CONTENT: &str = "content";

/// A stored record, without its vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    /// The text that was embedded.
    pub text: String,
    /// Flat JSON object used for filtering and for rebuilding results.
    pub metadata: Value,
    /// SHA-256 of `text`, hex encoded. Unchanged hashes skip re-embedding.
    pub hash: String,
}

/// A record returned from a nearest-neighbor query.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: Record,
    /// Cosine similarity to the query vector.
    pub similarity: f32,
}

/// Metadata predicate applied during a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `metadata[field] == value`.
    Eq(String, Value),
    /// Every inner filter matches.
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn matches(&self, metadata: &Value) -> bool {
        match self {
            Filter::Eq(field, value) => metadata.get(field) == Some(value),
            Filter::And(filters) => filters.iter().all(|f| f.matches(metadata)),
        }
    }
}

/// One embedding collection.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](Collection::upsert) | Insert or overwrite records by id |
/// | [`get`](Collection::get) | Fetch a record by id |
/// | [`hashes`](Collection::hashes) | Stored content hashes for a set of ids |
/// | [`query`](Collection::query) | Nearest neighbors, optionally filtered |
/// | [`list`](Collection::list) | Every record, unordered |
/// | [`count`](Collection::count) | Number of records |
/// | [`clear`](Collection::clear) | Drop every record |
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Insert or overwrite `records`; `vectors[i]` belongs to `records[i]`.
    async fn upsert(&self, records: &[Record], vectors: &[Vec<f32>]) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Record>>;

    /// Stored hashes for whichever of `ids` exist.
    async fn hashes(&self, ids: &[String]) -> Result<HashMap<String, String>>;

    /// Up to `limit` records matching `filter`, most similar first.
    async fn query(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScoredRecord>>;

    async fn list(&self) -> Result<Vec<Record>>;

    async fn count(&self) -> Result<usize>;

    async fn clear(&self) -> Result<()>;
}

/// Sort by descending similarity and keep the first `limit`.
pub(crate) fn rank(mut scored: Vec<ScoredRecord>, limit: usize) -> Vec<ScoredRecord> {
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}

/// Open the `(catalog, content)` collections for the configured backend.
pub async fn open_collections(
    config: &Config,
) -> Result<(Arc<dyn Collection>, Arc<dyn Collection>)> {
    match config.index.backend.as_str() {
        "memory" => Ok((
            Arc::new(memory::InMemoryCollection::new(CATALOG)),
            Arc::new(memory::InMemoryCollection::new(CONTENT)),
        )),
        "sqlite" => {
            let pool = db::connect(&config.index.path).await?;
            migrate::run_migrations(&pool).await?;
            Ok((
                Arc::new(sqlite::SqliteCollection::new(pool.clone(), CATALOG)),
                Arc::new(sqlite::SqliteCollection::new(pool, CONTENT)),
            ))
        }
        other => anyhow::bail!("Unknown index backend: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn and_filter_needs_every_clause() {
        let meta = json!({ "course_title": "A", "lesson_number": 2 });
        let both = Filter::And(vec![Filter::eq("course_title", "A"), Filter::eq("lesson_number", 2)]);
        assert!(both.matches(&meta));

        let wrong_lesson =
            Filter::And(vec![Filter::eq("course_title", "A"), Filter::eq("lesson_number", 3)]);
        assert!(!wrong_lesson.matches(&meta));
    }

    #[test]
    fn eq_filter_does_not_match_null() {
        let meta = json!({ "course_title": "A", "lesson_number": null });
        assert!(!Filter::eq("lesson_number", 0).matches(&meta));
        assert!(!Filter::eq("missing", "x").matches(&meta));
    }
}

//! In-memory [`Collection`] for tests and throwaway indexes.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Vector search is
//! brute-force cosine similarity over all stored vectors.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;

use super::{rank, Collection, Filter, Record, ScoredRecord};

struct StoredRecord {
    record: Record,
    vector: Vec<f32>,
}

pub struct InMemoryCollection {
    name: String,
    records: RwLock<HashMap<String, StoredRecord>>,
}

impl InMemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, StoredRecord>>> {
        self.records
            .read()
            .map_err(|_| anyhow!("collection '{}' lock poisoned", self.name))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, StoredRecord>>> {
        self.records
            .write()
            .map_err(|_| anyhow!("collection '{}' lock poisoned", self.name))
    }
}

#[async_trait]
impl Collection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, records: &[Record], vectors: &[Vec<f32>]) -> Result<()> {
        if records.len() != vectors.len() {
            anyhow::bail!(
                "{} records but {} vectors for collection '{}'",
                records.len(),
                vectors.len(),
                self.name
            );
        }
        let mut stored = self.write()?;
        for (record, vector) in records.iter().zip(vectors) {
            stored.insert(
                record.id.clone(),
                StoredRecord {
                    record: record.clone(),
                    vector: vector.clone(),
                },
            );
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Record>> {
        Ok(self.read()?.get(id).map(|s| s.record.clone()))
    }

    async fn hashes(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        let stored = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| stored.get(id).map(|s| (id.clone(), s.record.hash.clone())))
            .collect())
    }

    async fn query(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScoredRecord>> {
        let stored = self.read()?;
        let scored = stored
            .values()
            .filter(|s| filter.map_or(true, |f| f.matches(&s.record.metadata)))
            .map(|s| ScoredRecord {
                record: s.record.clone(),
                similarity: cosine_similarity(vector, &s.vector),
            })
            .collect();
        Ok(rank(scored, limit))
    }

    async fn list(&self) -> Result<Vec<Record>> {
        Ok(self.read()?.values().map(|s| s.record.clone()).collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    async fn clear(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }
}

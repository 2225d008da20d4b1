//! SQLite-backed [`Collection`].
//!
//! Every collection shares the `records` table, partitioned by the
//! `collection` column. Vectors are stored as little-endian `f32` BLOBs
//! and scored in process; metadata filters run on the decoded JSON.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};

use super::{rank, Collection, Filter, Record, ScoredRecord};

pub struct SqliteCollection {
    pool: SqlitePool,
    name: String,
}

impl SqliteCollection {
    pub fn new(pool: SqlitePool, name: impl Into<String>) -> Self {
        Self {
            pool,
            name: name.into(),
        }
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<Record> {
    let metadata_json: String = row.get("metadata_json");
    Ok(Record {
        id: row.get("id"),
        text: row.get("text"),
        metadata: serde_json::from_str(&metadata_json)?,
        hash: row.get("hash"),
    })
}

#[async_trait]
impl Collection for SqliteCollection {
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

        let mut tx = self.pool.begin().await?;
        for (record, vector) in records.iter().zip(vectors) {
            sqlx::query(
                r#"
                INSERT INTO records (collection, id, text, metadata_json, hash, embedding, dims)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    hash = excluded.hash,
                    embedding = excluded.embedding,
                    dims = excluded.dims
                "#,
            )
            .bind(&self.name)
            .bind(&record.id)
            .bind(&record.text)
            .bind(serde_json::to_string(&record.metadata)?)
            .bind(&record.hash)
            .bind(vec_to_blob(vector))
            .bind(vector.len() as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Record>> {
        let row = sqlx::query(
            "SELECT id, text, metadata_json, hash FROM records WHERE collection = ? AND id = ?",
        )
        .bind(&self.name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn hashes(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            let hash: Option<String> =
                sqlx::query_scalar("SELECT hash FROM records WHERE collection = ? AND id = ?")
                    .bind(&self.name)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;
            if let Some(hash) = hash {
                out.insert(id.clone(), hash);
            }
        }
        Ok(out)
    }

    async fn query(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScoredRecord>> {
        let rows = sqlx::query(
            "SELECT id, text, metadata_json, hash, embedding FROM records WHERE collection = ?",
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = row_to_record(row)?;
            if !filter.map_or(true, |f| f.matches(&record.metadata)) {
                continue;
            }
            let blob: Vec<u8> = row.get("embedding");
            let similarity = cosine_similarity(vector, &blob_to_vec(&blob));
            scored.push(ScoredRecord { record, similarity });
        }

        Ok(rank(scored, limit))
    }

    async fn list(&self) -> Result<Vec<Record>> {
        let rows = sqlx::query(
            "SELECT id, text, metadata_json, hash FROM records WHERE collection = ? ORDER BY id",
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(&self.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

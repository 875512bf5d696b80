//! Disk-resident [`VectorStore`] on SQLite.
//!
//! Vectors are stored as little-endian `f32` BLOBs next to their payload.
//! Search is a brute-force cosine scan over the collection in insertion
//! order, so equal scores keep a stable order.

use async_trait::async_trait;
use corpus_harness_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use corpus_harness_core::models::{Payload, Point, PointId, ScoredPoint};
use corpus_harness_core::store::{check_dims, top_k, CollectionInfo, IndexError, VectorStore};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

/// SQLite-backed index bound to one collection.
pub struct SqliteIndex {
    pool: SqlitePool,
    collection: String,
    score_threshold: Option<f32>,
    write_lock: Mutex<()>,
}

fn backend(e: sqlx::Error) -> IndexError {
    IndexError::Backend(e.to_string())
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
            score_threshold: None,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_score_threshold(mut self, threshold: Option<f32>) -> Self {
        self.score_threshold = threshold;
        self
    }

    async fn stored_dims(&self) -> Result<Option<usize>, IndexError> {
        let dims: Option<i64> = sqlx::query_scalar("SELECT dims FROM collections WHERE name = ?")
            .bind(&self.collection)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(dims.map(|d| d as usize))
    }
}

#[async_trait]
impl VectorStore for SqliteIndex {
    async fn ensure_collection(&self, dims: usize) -> Result<CollectionInfo, IndexError> {
        let _guard = self.write_lock.lock().await;

        if let Some(existing) = self.stored_dims().await? {
            if existing != dims {
                return Err(IndexError::DimensionMismatch {
                    collection: self.collection.clone(),
                    expected: existing,
                    actual: dims,
                });
            }
            return Ok(CollectionInfo {
                name: self.collection.clone(),
                dims,
            });
        }

        sqlx::query(
            "INSERT INTO collections (name, dims, distance, created_at) VALUES (?, ?, 'cosine', ?)",
        )
        .bind(&self.collection)
        .bind(dims as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        tracing::info!(collection = %self.collection, dims, "created collection");
        Ok(CollectionInfo {
            name: self.collection.clone(),
            dims,
        })
    }

    async fn upsert(&self, points: &[Point]) -> Result<(), IndexError> {
        let _guard = self.write_lock.lock().await;

        let dims = self
            .stored_dims()
            .await?
            .ok_or_else(|| IndexError::MissingCollection(self.collection.clone()))?;
        check_dims(&self.collection, dims, points)?;

        let mut tx = self.pool.begin().await.map_err(backend)?;
        for point in points {
            sqlx::query(
                r#"
                INSERT INTO points (collection, id, source, filename, chunk_index, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    source = excluded.source,
                    filename = excluded.filename,
                    chunk_index = excluded.chunk_index,
                    text = excluded.text,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&self.collection)
            .bind(point.id.to_string())
            .bind(&point.payload.source)
            .bind(&point.payload.filename)
            .bind(point.payload.chunk_index as i64)
            .bind(&point.payload.text)
            .bind(vec_to_blob(&point.vector))
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;

        tracing::debug!(collection = %self.collection, count = points.len(), "upserted points");
        Ok(())
    }

    async fn delete_by_source(&self, source: &str) -> Result<u64, IndexError> {
        let _guard = self.write_lock.lock().await;

        let result = sqlx::query("DELETE FROM points WHERE collection = ? AND source = ?")
            .bind(&self.collection)
            .bind(source)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPoint>, IndexError> {
        let Some(dims) = self.stored_dims().await? else {
            return Ok(Vec::new());
        };
        if query.len() != dims {
            return Err(IndexError::DimensionMismatch {
                collection: self.collection.clone(),
                expected: dims,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT id, source, filename, chunk_index, text, embedding
            FROM points
            WHERE collection = ?
            ORDER BY seq
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_id: String = row.get("id");
            let id = PointId::from_hex(&raw_id)
                .ok_or_else(|| IndexError::Backend(format!("corrupt point id '{}'", raw_id)))?;
            let blob: Vec<u8> = row.get("embedding");
            let chunk_index: i64 = row.get("chunk_index");

            scored.push(ScoredPoint {
                id,
                score: cosine_similarity(query, &blob_to_vec(&blob)),
                payload: Payload {
                    source: row.get("source"),
                    filename: row.get("filename"),
                    chunk_index: chunk_index as usize,
                    text: row.get("text"),
                },
            });
        }

        Ok(top_k(scored, k, self.score_threshold))
    }

    async fn count(&self) -> Result<u64, IndexError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM points WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        Ok(n as u64)
    }
}

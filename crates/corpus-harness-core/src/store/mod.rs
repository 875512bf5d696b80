//! Vector index abstraction.
//!
//! The [`VectorStore`] trait defines the operations the retrieval pipeline
//! needs from a vector index: one named, dimension-typed collection of
//! `(id, vector, payload)` records compared by cosine similarity.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`ensure_collection`](VectorStore::ensure_collection) | Create the collection or validate its dimension |
//! | [`upsert`](VectorStore::upsert) | Insert or overwrite records by id |
//! | [`delete_by_source`](VectorStore::delete_by_source) | Remove every record of one document |
//! | [`search`](VectorStore::search) | Top-k cosine nearest neighbors |
//! | [`count`](VectorStore::count) | Number of stored records |

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Point, ScoredPoint};

/// Errors raised by vector index backends. All are fatal to the caller.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The store could not be opened or read.
    #[error("vector index unavailable: {0}")]
    Unavailable(String),

    /// A write targeted a collection that was never created.
    #[error("collection '{0}' does not exist")]
    MissingCollection(String),

    /// A vector's length differs from the collection's fixed dimension,
    /// typically after switching embedding providers.
    #[error(
        "collection '{collection}' holds {expected}-dimensional vectors but got {actual}; \
         re-index after changing the embedding provider"
    )]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    /// Any other backend failure.
    #[error("vector index error: {0}")]
    Backend(String),
}

/// Name and dimensionality of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub dims: usize,
}

/// Abstract vector index bound to a single collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection with cosine distance and `dims` if absent.
    ///
    /// Idempotent. Fails with [`IndexError::DimensionMismatch`] when the
    /// collection already exists with a different dimension.
    async fn ensure_collection(&self, dims: usize) -> Result<CollectionInfo, IndexError>;

    /// Insert or overwrite records keyed by [`PointId`](crate::models::PointId).
    /// Atomic per call.
    async fn upsert(&self, points: &[Point]) -> Result<(), IndexError>;

    /// Remove every record whose payload `source` equals `source`.
    /// Returns the number removed (zero is not an error).
    async fn delete_by_source(&self, source: &str) -> Result<u64, IndexError>;

    /// Return at most `k` records by descending cosine similarity.
    /// Ties keep insertion order. A missing collection yields no results.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPoint>, IndexError>;

    /// Number of records in the collection.
    async fn count(&self) -> Result<u64, IndexError>;
}

/// Rank scored records: drop those under `threshold`, stable-sort by score
/// descending (ties keep their input order), keep the first `k`.
pub fn top_k(mut scored: Vec<ScoredPoint>, k: usize, threshold: Option<f32>) -> Vec<ScoredPoint> {
    if let Some(min) = threshold {
        scored.retain(|p| p.score >= min);
    }
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}

/// Check every vector of a write against the collection dimension.
pub fn check_dims(collection: &str, expected: usize, points: &[Point]) -> Result<(), IndexError> {
    match points.iter().find(|p| p.vector.len() != expected) {
        Some(bad) => Err(IndexError::DimensionMismatch {
            collection: collection.to_string(),
            expected,
            actual: bad.vector.len(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Payload, PointId};

    fn scored(index: usize, score: f32) -> ScoredPoint {
        ScoredPoint {
            id: PointId::for_chunk("doc", index),
            score,
            payload: Payload {
                source: "doc".into(),
                filename: "doc".into(),
                chunk_index: index,
                text: String::new(),
            },
        }
    }

    #[test]
    fn top_k_orders_by_score_and_keeps_ties_stable() {
        let ranked = top_k(
            vec![scored(0, 0.5), scored(1, 0.9), scored(2, 0.5), scored(3, 0.1)],
            3,
            None,
        );
        let order: Vec<usize> = ranked.iter().map(|p| p.payload.chunk_index).collect();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn top_k_applies_threshold() {
        let ranked = top_k(vec![scored(0, 0.2), scored(1, 0.8)], 10, Some(0.5));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].payload.chunk_index, 1);
    }
}

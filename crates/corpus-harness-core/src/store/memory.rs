//! In-memory [`VectorStore`] implementation for tests and ephemeral use.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`, so insertion order
//! doubles as the tie-break order for equal scores. Search is brute-force
//! cosine similarity over every stored vector.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Point, ScoredPoint};

use super::{check_dims, top_k, CollectionInfo, IndexError, VectorStore};

#[derive(Default)]
struct MemoryState {
    dims: Option<usize>,
    points: Vec<Point>,
}

/// In-memory vector index bound to one collection name.
pub struct InMemoryStore {
    collection: String,
    score_threshold: Option<f32>,
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            score_threshold: None,
            state: RwLock::new(MemoryState::default()),
        }
    }

    /// Drop search results scoring below `threshold`.
    pub fn with_score_threshold(mut self, threshold: Option<f32>) -> Self {
        self.score_threshold = threshold;
        self
    }

    fn poisoned<T>(_: T) -> IndexError {
        IndexError::Backend("in-memory store lock poisoned".to_string())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new("default")
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collection(&self, dims: usize) -> Result<CollectionInfo, IndexError> {
        let mut state = self.state.write().map_err(Self::poisoned)?;
        match state.dims {
            Some(existing) if existing != dims => Err(IndexError::DimensionMismatch {
                collection: self.collection.clone(),
                expected: existing,
                actual: dims,
            }),
            _ => {
                state.dims = Some(dims);
                Ok(CollectionInfo {
                    name: self.collection.clone(),
                    dims,
                })
            }
        }
    }

    async fn upsert(&self, points: &[Point]) -> Result<(), IndexError> {
        let mut state = self.state.write().map_err(Self::poisoned)?;
        let dims = state
            .dims
            .ok_or_else(|| IndexError::MissingCollection(self.collection.clone()))?;
        check_dims(&self.collection, dims, points)?;

        for point in points {
            match state.points.iter_mut().find(|p| p.id == point.id) {
                Some(existing) => *existing = point.clone(),
                None => state.points.push(point.clone()),
            }
        }
        Ok(())
    }

    async fn delete_by_source(&self, source: &str) -> Result<u64, IndexError> {
        let mut state = self.state.write().map_err(Self::poisoned)?;
        let before = state.points.len();
        state.points.retain(|p| p.payload.source != source);
        Ok((before - state.points.len()) as u64)
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPoint>, IndexError> {
        let state = self.state.read().map_err(Self::poisoned)?;
        let Some(dims) = state.dims else {
            return Ok(Vec::new());
        };
        if query.len() != dims {
            return Err(IndexError::DimensionMismatch {
                collection: self.collection.clone(),
                expected: dims,
                actual: query.len(),
            });
        }

        let scored = state
            .points
            .iter()
            .map(|p| ScoredPoint {
                id: p.id,
                score: cosine_similarity(query, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();
        Ok(top_k(scored, k, self.score_threshold))
    }

    async fn count(&self) -> Result<u64, IndexError> {
        let state = self.state.read().map_err(Self::poisoned)?;
        Ok(state.points.len() as u64)
    }
}

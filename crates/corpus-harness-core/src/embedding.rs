//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, the deterministic [`OfflineEmbedder`], and pure helpers for
//! vector serialization and similarity computation.
//!
//! Network and model-backed providers live in the `corpus-harness` app
//! crate. Every provider honors the same contract: one vector per input,
//! in input order, all of one dimensionality, and no hard failure. A
//! backend that cannot produce vectors degrades to offline vectors.

use async_trait::async_trait;

/// Dimensionality of the offline embedder (matches `all-MiniLM-L6-v2`).
pub const OFFLINE_DIMS: usize = 384;

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the nominal embedding dimensionality.
    fn dims(&self) -> usize;

    /// Embed a batch of texts. Never fails; degraded backends return
    /// offline vectors instead.
    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Vec<f32> {
        self.embed(&[text.to_string()])
            .await
            .into_iter()
            .next()
            .unwrap_or_default()
    }
}

/// Deterministic embedder for tests and disconnected operation.
///
/// Returns an all-ones vector for every input and never performs I/O.
///
/// ```rust
/// use corpus_harness_core::embedding::OfflineEmbedder;
///
/// let e = OfflineEmbedder::default();
/// let v = e.vectors(&["hello".to_string(), "world".to_string()]);
/// assert_eq!(v.len(), 2);
/// assert!(v[0].iter().all(|x| *x == 1.0));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct OfflineEmbedder {
    dims: usize,
}

impl OfflineEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    /// Synchronous form of [`EmbeddingProvider::embed`].
    pub fn vectors(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|_| vec![1.0; self.dims]).collect()
    }
}

impl Default for OfflineEmbedder {
    fn default() -> Self {
        Self::new(OFFLINE_DIMS)
    }
}

#[async_trait]
impl EmbeddingProvider for OfflineEmbedder {
    fn model_name(&self) -> &str {
        "offline"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        self.vectors(texts)
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use corpus_harness_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors
/// of different lengths, and zero vectors.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_embedder_is_deterministic() {
        let e = OfflineEmbedder::default();
        let texts = vec!["same text".to_string()];
        let first = e.embed(&texts).await;
        let second = e.embed(&texts).await;
        assert_eq!(first, second);
        assert_eq!(first[0].len(), OFFLINE_DIMS);
    }

    #[tokio::test]
    async fn offline_embedder_preserves_order_and_count() {
        let e = OfflineEmbedder::new(8);
        let texts: Vec<String> = (0..5).map(|i| format!("t{i}")).collect();
        let vectors = e.embed(&texts).await;
        assert_eq!(vectors.len(), 5);
        assert!(vectors.iter().all(|v| v.len() == 8));
        assert!(e.embed(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn embed_query_returns_single_vector() {
        let v = OfflineEmbedder::new(4).embed_query("q").await;
        assert_eq!(v, vec![1.0; 4]);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}

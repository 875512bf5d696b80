//! Embedding backends.
//!
//! [`Embedder`] is the closed set of providers the pipeline can use:
//! - **Offline**: all-ones vectors, no I/O.
//! - **Local**: a fastembed model run in-process (feature
//!   `local-embeddings-fastembed`).
//! - **Remote**: the OpenAI embeddings API through an [`HttpTransport`].
//!
//! None of them fail the caller. A local or remote backend that cannot
//! produce vectors logs a warning and returns all-ones vectors of its own
//! dimensionality, so the collection keeps one dimension.
//!
//! # Retry Strategy
//!
//! Remote calls use [`call_with_retry`]:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → give up
//! - Network errors → retry

#[cfg(feature = "local-embeddings-fastembed")]
mod local;

#[cfg(feature = "local-embeddings-fastembed")]
pub use local::LocalEmbedder;

use async_trait::async_trait;
use corpus_harness_core::embedding::{EmbeddingProvider, OfflineEmbedder};
use serde_json::Value;
use std::sync::Arc;

use crate::retry::{call_with_retry, CallOutcome, RetryPolicy};
use crate::transport::{HttpRequest, HttpTransport};

pub const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Embedding provider selected once at startup.
pub enum Embedder {
    Offline(OfflineEmbedder),
    #[cfg(feature = "local-embeddings-fastembed")]
    Local(LocalEmbedder),
    Remote(RemoteEmbedder),
}

impl Embedder {
    pub fn offline() -> Self {
        Self::Offline(OfflineEmbedder::default())
    }

    /// Load a local model, or fall back to offline vectors when the model
    /// is unavailable.
    #[cfg(feature = "local-embeddings-fastembed")]
    pub async fn local(model: &str) -> Self {
        match LocalEmbedder::load(model).await {
            Ok(embedder) => {
                tracing::info!(model, dims = embedder.dims(), "local embedding model loaded");
                Self::Local(embedder)
            }
            Err(e) => {
                tracing::warn!(model, error = %e, "local model unavailable, using offline vectors");
                Self::offline()
            }
        }
    }

    #[cfg(not(feature = "local-embeddings-fastembed"))]
    pub async fn local(model: &str) -> Self {
        tracing::warn!(
            model,
            "built without local-embeddings-fastembed, using offline vectors"
        );
        Self::offline()
    }

    /// Short provider label: `offline`, `local`, or `openai`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Offline(_) => "offline",
            #[cfg(feature = "local-embeddings-fastembed")]
            Self::Local(_) => "local",
            Self::Remote(_) => "openai",
        }
    }
}

#[async_trait]
impl EmbeddingProvider for Embedder {
    fn model_name(&self) -> &str {
        match self {
            Self::Offline(e) => e.model_name(),
            #[cfg(feature = "local-embeddings-fastembed")]
            Self::Local(e) => e.model_name(),
            Self::Remote(e) => e.model_name(),
        }
    }

    fn dims(&self) -> usize {
        match self {
            Self::Offline(e) => e.dims(),
            #[cfg(feature = "local-embeddings-fastembed")]
            Self::Local(e) => e.dims(),
            Self::Remote(e) => e.dims(),
        }
    }

    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        match self {
            Self::Offline(e) => e.vectors(texts),
            #[cfg(feature = "local-embeddings-fastembed")]
            Self::Local(e) => e.embed(texts).await,
            Self::Remote(e) => e.embed(texts).await,
        }
    }
}

/// Nominal dimensionality of OpenAI embedding models.
pub fn openai_model_dims(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        _ => 1536,
    }
}

/// Embedding provider using the OpenAI API (`POST /v1/embeddings`).
pub struct RemoteEmbedder {
    transport: Arc<dyn HttpTransport>,
    api_key: String,
    model: String,
    dims: usize,
    url: String,
    policy: RetryPolicy,
}

impl RemoteEmbedder {
    pub fn new(transport: Arc<dyn HttpTransport>, api_key: String, model: String) -> Self {
        let dims = openai_model_dims(&model);
        Self {
            transport,
            api_key,
            model,
            dims,
            url: OPENAI_EMBEDDINGS_URL.to_string(),
            policy: RetryPolicy::with_attempts(3),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn call(&self, texts: &[String]) -> CallOutcome<Vec<Vec<f32>>> {
        let request = HttpRequest::new(
            &self.url,
            serde_json::json!({
                "model": self.model,
                "input": texts,
            }),
        )
        .header("Authorization", format!("Bearer {}", self.api_key));

        let response = match self.transport.post_json(request).await {
            Ok(r) => r,
            Err(e) => return CallOutcome::Retryable(e.to_string()),
        };
        if response.is_transient() {
            return CallOutcome::Retryable(format!("OpenAI API error {}", response.status));
        }
        if !response.is_success() {
            return CallOutcome::Fatal(format!(
                "OpenAI API error {}: {}",
                response.status, response.body
            ));
        }

        match response.json() {
            Ok(json) => match parse_openai_response(&json, texts.len(), self.dims) {
                Ok(vectors) => CallOutcome::Success(vectors),
                Err(e) => CallOutcome::Fatal(e),
            },
            Err(e) => CallOutcome::Fatal(format!("invalid JSON from OpenAI: {}", e)),
        }
    }

    pub async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }
        match call_with_retry(&self.policy, "openai-embeddings", |_| self.call(texts)).await {
            Ok(vectors) => vectors,
            Err(e) => {
                tracing::warn!(model = %self.model, error = %e, "remote embedding failed, using offline vectors");
                OfflineEmbedder::new(self.dims).vectors(texts)
            }
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }
}

/// Extract `data[].embedding` in input order (by each item's `index`).
fn parse_openai_response(
    json: &Value,
    expected: usize,
    dims: usize,
) -> Result<Vec<Vec<f32>>, String> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or("Invalid OpenAI response: missing data array")?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding: Vec<f32> = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or("Invalid OpenAI response: missing embedding")?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        indexed.push((index, embedding));
    }
    indexed.sort_by_key(|(index, _)| *index);

    if indexed.len() != expected {
        return Err(format!(
            "OpenAI returned {} embeddings for {} inputs",
            indexed.len(),
            expected
        ));
    }
    if let Some((_, bad)) = indexed.iter().find(|(_, v)| v.len() != dims) {
        return Err(format!(
            "OpenAI returned a {}-dimensional vector, expected {}",
            bad.len(),
            dims
        ));
    }

    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpResponse, TransportError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Scripted {
        responses: Mutex<Vec<Result<HttpResponse, TransportError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(mut responses: Vec<Result<HttpResponse, TransportError>>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for Scripted {
        async fn post_json(&self, _: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(TransportError("script exhausted".into())))
        }
    }

    fn ok(body: Value) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: 200,
            body: body.to_string(),
        })
    }

    fn status(code: u16) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: code,
            body: "{}".into(),
        })
    }

    fn embedder(transport: Arc<Scripted>) -> RemoteEmbedder {
        RemoteEmbedder::new(transport, "sk-test".into(), "tiny".into())
            .with_policy(RetryPolicy::immediate(3))
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {i}")).collect()
    }

    fn embedding_body(vectors: &[(usize, Vec<f32>)]) -> Value {
        let data: Vec<Value> = vectors
            .iter()
            .map(|(i, v)| serde_json::json!({ "index": i, "embedding": v }))
            .collect();
        serde_json::json!({ "data": data })
    }

    #[tokio::test]
    async fn remote_orders_by_index() {
        let dims = openai_model_dims("tiny");
        let a = vec![0.5; dims];
        let b = vec![0.25; dims];
        let transport = Scripted::new(vec![ok(embedding_body(&[(1, b.clone()), (0, a.clone())]))]);
        let vectors = embedder(transport).embed(&texts(2)).await;
        assert_eq!(vectors, vec![a, b]);
    }

    #[tokio::test]
    async fn remote_retries_transient_errors() {
        let dims = openai_model_dims("tiny");
        let transport = Scripted::new(vec![
            status(429),
            Err(TransportError("reset".into())),
            ok(embedding_body(&[(0, vec![0.1; dims])])),
        ]);
        let vectors = embedder(transport.clone()).embed(&texts(1)).await;
        assert_eq!(vectors[0][0], 0.1);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn remote_failure_degrades_to_offline_vectors() {
        let transport = Scripted::new(vec![status(401)]);
        let e = embedder(transport.clone());
        let vectors = e.embed(&texts(2)).await;
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == e.dims()));
        assert!(vectors[0].iter().all(|x| *x == 1.0));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_response_degrades_to_offline_vectors() {
        let dims = openai_model_dims("tiny");
        let transport = Scripted::new(vec![ok(embedding_body(&[(0, vec![0.3; dims])]))]);
        let vectors = embedder(transport).embed(&texts(2)).await;
        assert_eq!(vectors.len(), 2);
        assert!(vectors[1].iter().all(|x| *x == 1.0));
    }

    #[tokio::test]
    async fn empty_batch_makes_no_call() {
        let transport = Scripted::new(vec![]);
        assert!(embedder(transport.clone()).embed(&[]).await.is_empty());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn offline_variant_has_fixed_dims() {
        let e = Embedder::offline();
        assert_eq!(e.kind(), "offline");
        assert_eq!(e.dims(), 384);
        assert_eq!(e.embed_query("q").await.len(), 384);
    }
}

//! Ingestion, retrieval, and answering orchestration.
//!
//! Ingestion flows document → clean text → token windows → embeddings →
//! vector index, and fails fast: a document or index error aborts that
//! document. Answering is fail-safe and always produces text.

use corpus_harness_core::chunk::chunk_document;
use corpus_harness_core::embedding::EmbeddingProvider;
use corpus_harness_core::models::RetrievalHit;
use corpus_harness_core::store::{IndexError, VectorStore};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Settings;
use crate::extract::{read_document, DocumentError};
use crate::generation::Generator;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Embed `query`, then return the `k` nearest chunks as hits.
///
/// An empty collection or a store with nothing above its threshold yields
/// an empty list. `k == 0` returns immediately without embedding.
pub async fn retrieve(
    embedder: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
    query: &str,
    k: usize,
) -> Result<Vec<RetrievalHit>, IndexError> {
    if k == 0 {
        return Ok(Vec::new());
    }
    let vector = embedder.embed_query(query).await;
    store.ensure_collection(vector.len()).await?;
    let hits = store.search(&vector, k).await?;
    tracing::debug!(k, found = hits.len(), "retrieved");
    Ok(hits.into_iter().map(RetrievalHit::from).collect())
}

pub struct Pipeline {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<Generator>,
    chunk_size: usize,
    chunk_overlap: usize,
    purge_stale: bool,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<Generator>,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            chunk_size: 800,
            chunk_overlap: 100,
            purge_stale: false,
        }
    }

    /// Apply chunking and ingest options from resolved settings.
    pub fn configured(mut self, settings: &Settings) -> Self {
        self.chunk_size = settings.chunk_size;
        self.chunk_overlap = settings.chunk_overlap;
        self.purge_stale = settings.purge_stale;
        self
    }

    pub fn with_chunking(mut self, size: usize, overlap: usize) -> Self {
        self.chunk_size = size;
        self.chunk_overlap = overlap;
        self
    }

    /// Delete a document's previous chunks before re-ingesting it.
    pub fn with_purge_stale(mut self, purge: bool) -> Self {
        self.purge_stale = purge;
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Ingest one document. Returns `(chunks indexed, characters of clean text)`.
    pub async fn add_path(&self, path: &Path) -> Result<(usize, usize), PipelineError> {
        let text = read_document(path)?;
        let chars = text.chars().count();
        let source = path.to_string_lossy();

        let chunks = chunk_document(&source, &text, self.chunk_size, self.chunk_overlap);
        if chunks.is_empty() {
            tracing::info!(source = %source, "document has no text, nothing indexed");
            return Ok((0, chars));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await;
        self.store.ensure_collection(self.embedder.dims()).await?;

        if self.purge_stale {
            let removed = self.store.delete_by_source(&source).await?;
            tracing::debug!(source = %source, removed, "purged previous chunks");
        }

        let points: Vec<_> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| chunk.into_point(vector))
            .collect();
        let count = points.len();
        self.store.upsert(&points).await?;

        tracing::info!(source = %source, chunks = count, chars, "indexed document");
        Ok((count, chars))
    }

    /// Remove every chunk of a document. Returns whether anything was removed.
    pub async fn delete_by_source(&self, path: &Path) -> Result<bool, IndexError> {
        let source = path.to_string_lossy();
        let removed = self.store.delete_by_source(&source).await?;
        tracing::info!(source = %source, removed, "deleted document");
        Ok(removed > 0)
    }

    pub async fn query(&self, question: &str, k: usize) -> Result<Vec<RetrievalHit>, IndexError> {
        retrieve(self.embedder.as_ref(), self.store.as_ref(), question, k).await
    }

    pub async fn answer(&self, question: &str, hits: &[RetrievalHit]) -> String {
        self.generator.grounded_answer(question, hits).await
    }

    /// Retrieve then answer. Returns the answer and the hits it cites.
    pub async fn ask(
        &self,
        question: &str,
        k: usize,
    ) -> Result<(String, Vec<RetrievalHit>), IndexError> {
        let hits = self.query(question, k).await?;
        let answer = self.answer(question, &hits).await;
        Ok((answer, hits))
    }
}

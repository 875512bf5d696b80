//! In-process embeddings via fastembed (bundled ONNX Runtime).
//!
//! The model is downloaded from Hugging Face on first use and cached;
//! after that, embedding runs entirely offline. It is loaded once and
//! shared behind a mutex because `TextEmbedding::embed` needs `&mut self`.

use anyhow::{bail, Result};
use corpus_harness_core::embedding::OfflineEmbedder;
use std::sync::{Arc, Mutex};

pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    model: Arc<Mutex<fastembed::TextEmbedding>>,
}

/// Map a configured model name to its fastembed model and dimensionality.
/// Names are matched case-insensitively.
pub(crate) fn resolve_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
    use fastembed::EmbeddingModel::*;
    let key = name.trim().to_ascii_lowercase();
    let resolved = match key.as_str() {
        "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => (AllMiniLML6V2, 384),
        "bge-small-en-v1.5" => (BGESmallENV15, 384),
        "bge-base-en-v1.5" => (BGEBaseENV15, 768),
        "bge-large-en-v1.5" => (BGELargeENV15, 1024),
        "multilingual-e5-small" => (MultilingualE5Small, 384),
        "multilingual-e5-base" => (MultilingualE5Base, 768),
        "multilingual-e5-large" => (MultilingualE5Large, 1024),
        _ => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            name
        ),
    };
    Ok(resolved)
}

impl LocalEmbedder {
    pub async fn load(name: &str) -> Result<Self> {
        let (model, dims) = resolve_model(name)?;

        let loaded = tokio::task::spawn_blocking(move || {
            fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(model).with_show_download_progress(false),
            )
            .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))
        })
        .await??;

        Ok(Self {
            model_name: name.to_string(),
            dims,
            model: Arc::new(Mutex::new(loaded)),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }
        let model = Arc::clone(&self.model);
        let batch = texts.to_vec();

        let result = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| anyhow::anyhow!("local embedding model lock poisoned"))?;
            model
                .embed(batch, None)
                .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
        })
        .await;

        match result {
            Ok(Ok(vectors)) if vectors.len() == texts.len() => vectors,
            Ok(Ok(vectors)) => {
                tracing::warn!(
                    got = vectors.len(),
                    expected = texts.len(),
                    "local model returned a short batch, using offline vectors"
                );
                OfflineEmbedder::new(self.dims).vectors(texts)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "local embedding failed, using offline vectors");
                OfflineEmbedder::new(self.dims).vectors(texts)
            }
            Err(e) => {
                tracing::warn!(error = %e, "local embedding task failed, using offline vectors");
                OfflineEmbedder::new(self.dims).vectors(texts)
            }
        }
    }
}

//! One-time provider selection.
//!
//! [`ProviderSelection::select`] turns resolved [`Settings`] into the
//! embedding and generation backends the pipeline uses for the rest of the
//! process. In forced-offline mode the HTTP transport is dropped without
//! being handed to any backend.

use corpus_harness_core::embedding::EmbeddingProvider;
use std::sync::Arc;

use crate::config::{EmbeddingKind, GenerationKind, Settings};
use crate::embedding::{Embedder, RemoteEmbedder};
use crate::generation::{ChatBackend, GenerationBackend, Generator};
use crate::retry::RetryPolicy;
use crate::transport::HttpTransport;

pub struct ProviderSelection {
    pub embedder: Arc<Embedder>,
    pub generator: Arc<Generator>,
    pub offline: bool,
}

impl ProviderSelection {
    /// Offline embedding and extractive generation.
    pub fn offline() -> Self {
        Self {
            embedder: Arc::new(Embedder::offline()),
            generator: Arc::new(Generator::offline()),
            offline: true,
        }
    }

    pub async fn select(settings: &Settings, transport: Arc<dyn HttpTransport>) -> Self {
        if settings.offline {
            tracing::info!("offline mode forced, remote providers disabled");
            let mut selection = Self::offline();
            selection.generator = Arc::new(Generator::new(
                GenerationBackend::Offline,
                RetryPolicy::default(),
                settings.language.clone(),
            ));
            return selection;
        }

        let embedder = match settings.embedding {
            EmbeddingKind::Offline => Embedder::offline(),
            EmbeddingKind::Local => Embedder::local(&settings.local_model).await,
            EmbeddingKind::OpenAi => match &settings.openai_api_key {
                Some(key) => Embedder::Remote(
                    RemoteEmbedder::new(
                        Arc::clone(&transport),
                        key.clone(),
                        settings.openai_embed_model.clone(),
                    )
                    .with_policy(RetryPolicy::with_attempts(settings.embedding_attempts)),
                ),
                None => {
                    tracing::warn!("OPENAI_API_KEY missing, using offline embeddings");
                    Embedder::offline()
                }
            },
        };

        let backend = match settings.generation {
            GenerationKind::Offline => GenerationBackend::Offline,
            GenerationKind::OpenAi => match &settings.openai_api_key {
                Some(key) => GenerationBackend::Chat(ChatBackend::openai(
                    Arc::clone(&transport),
                    key.clone(),
                    settings.openai_chat_model.clone(),
                )),
                None => {
                    tracing::warn!("OPENAI_API_KEY missing, using extractive answers");
                    GenerationBackend::Offline
                }
            },
            GenerationKind::Anthropic => match &settings.anthropic_api_key {
                Some(key) => GenerationBackend::Chat(ChatBackend::anthropic(
                    Arc::clone(&transport),
                    key.clone(),
                    settings.anthropic_model.clone(),
                )),
                None => {
                    tracing::warn!("ANTHROPIC_API_KEY missing, using extractive answers");
                    GenerationBackend::Offline
                }
            },
        };
        let generator = Generator::new(
            backend,
            RetryPolicy::with_attempts(settings.generation_attempts),
            settings.language.clone(),
        );

        tracing::info!(
            embedding = embedder.kind(),
            generation = generator.backend_name(),
            "providers selected"
        );

        Self {
            embedder: Arc::new(embedder),
            generator: Arc::new(generator),
            offline: false,
        }
    }

    /// Human-readable summary for the `providers` command.
    pub fn describe(&self) -> String {
        let generation = match self.generator.model() {
            Some(model) => format!("{} ({})", self.generator.backend_name(), model),
            None => self.generator.backend_name().to_string(),
        };
        format!(
            "offline: {}\nembedding: {} ({}, {} dims)\ngeneration: {}\nlanguage: {}",
            self.offline,
            self.embedder.kind(),
            self.embedder.model_name(),
            self.embedder.dims(),
            generation,
            self.generator.language()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;
    use crate::transport::{HttpRequest, HttpResponse, TransportError};
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl HttpTransport for Unreachable {
        async fn post_json(&self, _: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError("unreachable".into()))
        }
    }

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::resolve(&FileConfig::default(), |key| {
            pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[tokio::test]
    async fn forced_offline_selects_offline_backends() {
        let s = settings(&[
            ("CI", "true"),
            ("RAG_EMBEDDINGS", "openai"),
            ("LLM_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk-real"),
            ("RAG_LANGUAGE", "French"),
        ]);
        let selection = ProviderSelection::select(&s, Arc::new(Unreachable)).await;
        assert!(selection.offline);
        assert_eq!(selection.embedder.kind(), "offline");
        assert_eq!(selection.generator.backend_name(), "offline");
        assert_eq!(selection.generator.language(), "French");
    }

    #[tokio::test]
    async fn remote_backends_with_keys() {
        let s = settings(&[
            ("RAG_EMBEDDINGS", "openai"),
            ("LLM_PROVIDER", "anthropic"),
            ("OPENAI_API_KEY", "sk"),
            ("ANTHROPIC_API_KEY", "ak"),
        ]);
        let selection = ProviderSelection::select(&s, Arc::new(Unreachable)).await;
        assert_eq!(selection.embedder.kind(), "openai");
        assert_eq!(selection.embedder.dims(), 1536);
        assert_eq!(selection.generator.backend_name(), "anthropic");
        assert!(selection.describe().contains("generation: anthropic"));
    }

    #[tokio::test]
    async fn missing_keys_degrade_to_offline() {
        let s = settings(&[
            ("RAG_EMBEDDINGS", "openai"),
            ("LLM_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "dummy"),
        ]);
        let selection = ProviderSelection::select(&s, Arc::new(Unreachable)).await;
        assert!(!selection.offline);
        assert_eq!(selection.embedder.kind(), "offline");
        assert_eq!(selection.generator.backend_name(), "offline");
    }
}

//! Configuration parsing and provider precedence.
//!
//! Configuration comes from two layers, merged once at startup into a
//! single [`Settings`] value that is passed to every component:
//!
//! 1. an optional TOML file ([`FileConfig`], default `./config/corpus.toml`),
//! 2. environment variables (a `.env` file is loaded first if present).
//!
//! # Provider precedence
//!
//! For both the embedding and the generation backend, highest first:
//!
//! | Rank | Signal | Effect |
//! |------|--------|--------|
//! | 1 | `CI` ∈ {`true`, `True`, `1`}, `RAG_OFFLINE`, or `offline = true` | everything offline |
//! | 2 | `RAG_EMBEDDINGS` / `EMBEDDINGS_PROVIDER`, `LLM_PROVIDER` | explicit override |
//! | 3 | `[embedding] provider`, `[generation] provider` | configured default |
//! | 4 | built-in | embedding `local`, generation `offline` |
//!
//! # Example file
//!
//! ```toml
//! [index]
//! dir = "./data/vectorstore"
//! collection = "legal_docs"
//!
//! [chunking]
//! size = 800
//! overlap = 100
//!
//! [retrieval]
//! max_ctx_docs = 6
//!
//! [embedding]
//! provider = "local"
//! model = "all-minilm-l6-v2"
//!
//! [generation]
//! provider = "openai"
//! language = "English"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Raw TOML configuration. Every table and key is optional.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FileConfig {
    pub offline: bool,
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub ingest: IngestConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding the SQLite index file.
    pub dir: PathBuf,
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/vectorstore"),
            collection: "legal_docs".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Tokens per chunk.
    pub size: usize,
    /// Tokens shared by consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: 800,
            overlap: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub max_ctx_docs: usize,
    /// Minimum cosine similarity for a hit; unset keeps every match.
    pub score_threshold: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_ctx_docs: 6,
            score_threshold: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: Option<String>,
    /// Local model name (fastembed).
    pub model: Option<String>,
    /// Remote model name.
    pub remote_model: Option<String>,
    pub max_attempts: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            remote_model: None,
            max_attempts: 3,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: Option<String>,
    pub openai_model: Option<String>,
    pub anthropic_model: Option<String>,
    /// Language the answer is written in.
    pub language: Option<String>,
    pub max_attempts: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: None,
            openai_model: None,
            anthropic_model: None,
            language: None,
            max_attempts: 6,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct IngestConfig {
    /// Delete a document's existing chunks before re-ingesting it.
    pub purge_stale: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/chat_history.json"),
        }
    }
}

/// Embedding backend names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingKind {
    Offline,
    Local,
    OpenAi,
}

impl EmbeddingKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "offline" | "dummy" => Some(Self::Offline),
            "local" => Some(Self::Local),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Local => "local",
            Self::OpenAi => "openai",
        }
    }
}

/// Generation backend names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Offline,
    OpenAi,
    Anthropic,
}

impl GenerationKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "offline" | "dummy" => Some(Self::Offline),
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

/// Fully resolved configuration, assembled once per process.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Forced-offline mode: no component may perform network I/O.
    pub offline: bool,
    pub index_dir: PathBuf,
    pub collection: String,
    pub history_path: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_ctx_docs: usize,
    pub score_threshold: Option<f32>,
    pub purge_stale: bool,
    pub embedding: EmbeddingKind,
    pub local_model: String,
    pub openai_embed_model: String,
    pub embedding_attempts: u32,
    pub generation: GenerationKind,
    pub openai_chat_model: String,
    pub anthropic_model: String,
    pub generation_attempts: u32,
    pub language: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    /// Per-request timeout for remote backends.
    pub request_timeout: Duration,
}

impl Settings {
    /// Merge a file config with an environment lookup.
    ///
    /// `env` is injected so resolution can be tested without touching the
    /// process environment; [`Settings::from_env`] passes `std::env::var`.
    pub fn resolve(file: &FileConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let ci = matches!(var("CI").as_deref(), Some("true" | "True" | "1"));
        let offline_flag = var("RAG_OFFLINE")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        let offline = ci || offline_flag || file.offline;

        let embedding = if offline {
            EmbeddingKind::Offline
        } else if let Some(name) = var("RAG_EMBEDDINGS").or_else(|| var("EMBEDDINGS_PROVIDER")) {
            EmbeddingKind::parse(&name).unwrap_or_else(|| {
                tracing::warn!(provider = %name, "unknown embedding provider, using offline vectors");
                EmbeddingKind::Offline
            })
        } else if let Some(name) = &file.embedding.provider {
            EmbeddingKind::parse(name)
                .with_context(|| format!("Unknown embedding provider in config: '{}'", name))?
        } else {
            EmbeddingKind::Local
        };

        let generation = if offline {
            GenerationKind::Offline
        } else if let Some(name) = var("LLM_PROVIDER") {
            GenerationKind::parse(&name).unwrap_or_else(|| {
                tracing::warn!(provider = %name, "unknown generation provider, using offline answers");
                GenerationKind::Offline
            })
        } else if let Some(name) = &file.generation.provider {
            GenerationKind::parse(name)
                .with_context(|| format!("Unknown generation provider in config: '{}'", name))?
        } else {
            GenerationKind::Offline
        };

        let parse_usize = |key: &str, default: usize| -> Result<usize> {
            match var(key) {
                Some(v) => v
                    .parse()
                    .with_context(|| format!("{} must be a non-negative integer, got '{}'", key, v)),
                None => Ok(default),
            }
        };

        // A key of "dummy" is how CI marks credentials as absent.
        let api_key = |key: &str| var(key).filter(|k| k != "dummy");

        let settings = Self {
            offline,
            index_dir: var("RAG_INDEX_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| file.index.dir.clone()),
            collection: file.index.collection.clone(),
            history_path: var("RAG_HISTORY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| file.history.path.clone()),
            chunk_size: parse_usize("RAG_CHUNK_SIZE", file.chunking.size)?,
            chunk_overlap: parse_usize("RAG_CHUNK_OVERLAP", file.chunking.overlap)?,
            max_ctx_docs: parse_usize("RAG_MAX_CTX_DOCS", file.retrieval.max_ctx_docs)?,
            score_threshold: file.retrieval.score_threshold,
            purge_stale: file.ingest.purge_stale,
            embedding,
            local_model: var("ST_MODEL")
                .or_else(|| file.embedding.model.clone())
                .unwrap_or_else(|| "all-minilm-l6-v2".to_string()),
            openai_embed_model: var("OPENAI_EMBED_MODEL")
                .or_else(|| file.embedding.remote_model.clone())
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            embedding_attempts: file.embedding.max_attempts,
            generation,
            openai_chat_model: var("OPENAI_CHAT_MODEL")
                .or_else(|| file.generation.openai_model.clone())
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            anthropic_model: var("ANTHROPIC_MODEL")
                .or_else(|| file.generation.anthropic_model.clone())
                .unwrap_or_else(|| "claude-3-5-sonnet-latest".to_string()),
            generation_attempts: file.generation.max_attempts,
            language: var("RAG_LANGUAGE")
                .or_else(|| file.generation.language.clone())
                .unwrap_or_else(|| "English".to_string()),
            openai_api_key: api_key("OPENAI_API_KEY"),
            anthropic_api_key: api_key("ANTHROPIC_API_KEY"),
            request_timeout: Duration::from_secs(file.embedding.timeout_secs),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Resolve against the process environment.
    pub fn from_env(file: &FileConfig) -> Result<Self> {
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunking.size must be > 0");
        }
        if self.max_ctx_docs < 1 {
            bail!("retrieval.max_ctx_docs must be >= 1");
        }
        if self.embedding_attempts < 1 || self.generation_attempts < 1 {
            bail!("max_attempts must be >= 1");
        }
        if let Some(t) = self.score_threshold {
            if !(-1.0..=1.0).contains(&t) {
                bail!("retrieval.score_threshold must be in [-1.0, 1.0]");
            }
        }
        Ok(())
    }
}

/// Read and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    Ok(config)
}

/// Load `.env`, the config file (if it exists), and resolve [`Settings`].
pub fn load_settings(path: &Path) -> Result<Settings> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "ignoring unreadable .env file");
        }
    }

    let file = if path.exists() {
        load_config(path)?
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        FileConfig::default()
    };

    Settings::from_env(&file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(file: &FileConfig, pairs: &[(&str, &str)]) -> Settings {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::resolve(file, |k| env.get(k).cloned()).unwrap()
    }

    fn file_with_providers(embedding: &str, generation: &str) -> FileConfig {
        let mut file = FileConfig::default();
        file.embedding.provider = Some(embedding.to_string());
        file.generation.provider = Some(generation.to_string());
        file
    }

    #[test]
    fn built_in_defaults() {
        let s = resolve(&FileConfig::default(), &[]);
        assert!(!s.offline);
        assert_eq!(s.embedding, EmbeddingKind::Local);
        assert_eq!(s.generation, GenerationKind::Offline);
        assert_eq!(s.chunk_size, 800);
        assert_eq!(s.chunk_overlap, 100);
        assert_eq!(s.max_ctx_docs, 6);
        assert_eq!(s.collection, "legal_docs");
        assert_eq!(s.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn configured_default_beats_built_in() {
        let s = resolve(&file_with_providers("openai", "anthropic"), &[]);
        assert_eq!(s.embedding, EmbeddingKind::OpenAi);
        assert_eq!(s.generation, GenerationKind::Anthropic);
    }

    #[test]
    fn explicit_override_beats_configured_default() {
        let s = resolve(
            &file_with_providers("openai", "anthropic"),
            &[("RAG_EMBEDDINGS", "local"), ("LLM_PROVIDER", "openai")],
        );
        assert_eq!(s.embedding, EmbeddingKind::Local);
        assert_eq!(s.generation, GenerationKind::OpenAi);

        let s = resolve(&FileConfig::default(), &[("EMBEDDINGS_PROVIDER", "openai")]);
        assert_eq!(s.embedding, EmbeddingKind::OpenAi);
    }

    #[test]
    fn forced_offline_beats_everything() {
        for pairs in [
            vec![("CI", "true")],
            vec![("CI", "1")],
            vec![("RAG_OFFLINE", "yes")],
        ] {
            let mut pairs = pairs;
            pairs.push(("RAG_EMBEDDINGS", "openai"));
            pairs.push(("LLM_PROVIDER", "openai"));
            let s = resolve(&file_with_providers("openai", "openai"), &pairs);
            assert!(s.offline);
            assert_eq!(s.embedding, EmbeddingKind::Offline);
            assert_eq!(s.generation, GenerationKind::Offline);
        }

        let mut file = file_with_providers("openai", "openai");
        file.offline = true;
        assert!(resolve(&file, &[]).offline);
    }

    #[test]
    fn ci_false_does_not_force_offline() {
        let s = resolve(&FileConfig::default(), &[("CI", "false")]);
        assert!(!s.offline);
    }

    #[test]
    fn unknown_env_provider_degrades_to_offline() {
        let s = resolve(
            &FileConfig::default(),
            &[("RAG_EMBEDDINGS", "mystery"), ("LLM_PROVIDER", "mystery")],
        );
        assert_eq!(s.embedding, EmbeddingKind::Offline);
        assert_eq!(s.generation, GenerationKind::Offline);
    }

    #[test]
    fn unknown_file_provider_is_rejected() {
        let file = file_with_providers("mystery", "offline");
        assert!(Settings::resolve(&file, |_| None).is_err());
    }

    #[test]
    fn dummy_or_blank_keys_count_as_missing() {
        let s = resolve(
            &FileConfig::default(),
            &[("OPENAI_API_KEY", "dummy"), ("ANTHROPIC_API_KEY", "  ")],
        );
        assert!(s.openai_api_key.is_none());
        assert!(s.anthropic_api_key.is_none());
    }

    #[test]
    fn env_overrides_numbers_and_paths() {
        let s = resolve(
            &FileConfig::default(),
            &[
                ("RAG_CHUNK_SIZE", "50"),
                ("RAG_CHUNK_OVERLAP", "5"),
                ("RAG_MAX_CTX_DOCS", "3"),
                ("RAG_INDEX_DIR", "/tmp/idx"),
            ],
        );
        assert_eq!(s.chunk_size, 50);
        assert_eq!(s.chunk_overlap, 5);
        assert_eq!(s.max_ctx_docs, 3);
        assert_eq!(s.index_dir, PathBuf::from("/tmp/idx"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Settings::resolve(&FileConfig::default(), |k| {
            (k == "RAG_CHUNK_SIZE").then(|| "0".to_string())
        })
        .is_err());
        assert!(Settings::resolve(&FileConfig::default(), |k| {
            (k == "RAG_MAX_CTX_DOCS").then(|| "many".to_string())
        })
        .is_err());
    }

    #[test]
    fn parses_toml_file() {
        let file: FileConfig = toml::from_str(
            r#"
            offline = true

            [chunking]
            size = 120

            [generation]
            provider = "anthropic"
            language = "French"
            "#,
        )
        .unwrap();
        assert!(file.offline);
        assert_eq!(file.chunking.size, 120);
        assert_eq!(file.chunking.overlap, 100);
        assert_eq!(file.generation.language.as_deref(), Some("French"));
        assert_eq!(file.index.collection, "legal_docs");
    }

    #[test]
    fn index_table_ignores_upload_dir() {
        let file: FileConfig = toml::from_str(
            r#"
            [index]
            dir = "/srv/corpus"
            upload_dir = "./data/uploads"
            "#,
        )
        .unwrap();
        let s = resolve(&file, &[("RAG_UPLOAD_DIR", "/elsewhere")]);
        assert_eq!(s.index_dir, PathBuf::from("/srv/corpus"));
        assert_eq!(s.collection, "legal_docs");
    }
}

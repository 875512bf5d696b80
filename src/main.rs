//! # Corpus Harness CLI (`corpus`)
//!
//! ## Usage
//!
//! ```bash
//! corpus --config ./config/corpus.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `corpus init` | Create the index database and collection |
//! | `corpus add <paths…>` | Ingest documents (.txt, .csv, .html) |
//! | `corpus delete <path>` | Remove a document's chunks |
//! | `corpus query "<q>"` | Show the nearest chunks |
//! | `corpus ask "<q>"` | Answer from the corpus, with sources |
//! | `corpus providers` | Show the selected backends |
//! | `corpus stats` | Show the number of indexed chunks |

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use corpus_harness::config::{load_settings, Settings};
use corpus_harness::db::{IndexHandle, INDEX_FILE};
use corpus_harness::history::HistoryStore;
use corpus_harness::providers::ProviderSelection;
use corpus_harness::rag::Pipeline;
use corpus_harness::transport::ReqwestTransport;
use corpus_harness_core::answer::citation_label;
use corpus_harness_core::embedding::EmbeddingProvider;
use corpus_harness_core::store::VectorStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Corpus Harness CLI: answer questions strictly from your own documents.
#[derive(Parser)]
#[command(name = "corpus", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/corpus.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index database and collection. Idempotent.
    Init,

    /// Ingest one or more documents. Failures are reported per document.
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Remove every chunk of a document.
    Delete { path: PathBuf },

    /// Show the chunks nearest to a question.
    Query {
        question: String,

        /// Number of chunks to return (default: retrieval.max_ctx_docs).
        #[arg(short, long)]
        k: Option<usize>,

        /// Print hits as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from the indexed documents.
    Ask {
        question: String,

        #[arg(short, long)]
        k: Option<usize>,

        /// Append to an existing conversation in the history log.
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Show the resolved embedding and generation backends.
    Providers,

    /// Show index statistics.
    Stats,
}

async fn open_pipeline(settings: &Settings, selection: &ProviderSelection) -> Result<Pipeline> {
    let index = IndexHandle::new(&settings.index_dir, settings.collection.clone())
        .with_score_threshold(settings.score_threshold)
        .open()
        .await?;
    Ok(Pipeline::new(
        index,
        selection.embedder.clone(),
        selection.generator.clone(),
    )
    .configured(settings))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli.config)?;
    let transport = Arc::new(ReqwestTransport::new(settings.request_timeout)?);
    let selection = ProviderSelection::select(&settings, transport).await;

    match cli.command {
        Commands::Providers => {
            println!("{}", selection.describe());
        }
        Commands::Init => {
            let pipeline = open_pipeline(&settings, &selection).await?;
            let info = pipeline
                .store()
                .ensure_collection(selection.embedder.dims())
                .await?;
            println!(
                "Index initialized at {} (collection '{}', {} dims).",
                settings.index_dir.join(INDEX_FILE).display(),
                info.name,
                info.dims
            );
        }
        Commands::Add { paths } => {
            let pipeline = open_pipeline(&settings, &selection).await?;
            let mut failed = 0;
            for path in &paths {
                match pipeline.add_path(path).await {
                    Ok((chunks, chars)) => {
                        println!("{}: {} chunks, {} characters", path.display(), chunks, chars)
                    }
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}: {}", path.display(), e);
                    }
                }
            }
            if failed > 0 {
                bail!("{} of {} documents failed", failed, paths.len());
            }
        }
        Commands::Delete { path } => {
            let pipeline = open_pipeline(&settings, &selection).await?;
            if pipeline.delete_by_source(&path).await? {
                println!("Deleted {}", path.display());
            } else {
                println!("Nothing indexed for {}", path.display());
            }
        }
        Commands::Query { question, k, json } => {
            let pipeline = open_pipeline(&settings, &selection).await?;
            let hits = pipeline
                .query(&question, k.unwrap_or(settings.max_ctx_docs))
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("No results.");
            } else {
                for (rank, hit) in hits.iter().enumerate() {
                    let excerpt: String = hit.text.chars().take(160).collect();
                    println!(
                        "{}. {:.3} {}\n   {}",
                        rank + 1,
                        hit.meta.score,
                        citation_label(hit),
                        excerpt.replace('\n', " ")
                    );
                }
            }
        }
        Commands::Ask {
            question,
            k,
            conversation,
        } => {
            let pipeline = open_pipeline(&settings, &selection).await?;
            let (answer, _) = pipeline
                .ask(&question, k.unwrap_or(settings.max_ctx_docs))
                .await?;
            println!("{}", answer);

            let history = HistoryStore::new(&settings.history_path);
            let id = history.append_exchange(conversation.as_deref(), &question, &answer)?;
            eprintln!("conversation: {}", id);
        }
        Commands::Stats => {
            let pipeline = open_pipeline(&settings, &selection).await?;
            println!("collection: {}", settings.collection);
            println!("index: {}", settings.index_dir.join(INDEX_FILE).display());
            println!("chunks: {}", pipeline.store().count().await?);
        }
    }

    Ok(())
}

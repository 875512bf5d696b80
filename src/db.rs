use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::OnceCell;

use corpus_harness_core::store::IndexError;

use crate::migrate;
use crate::sqlite_store::SqliteIndex;

/// File name of the index database inside the index directory.
pub const INDEX_FILE: &str = "index.sqlite";

pub async fn connect(index_dir: &Path) -> Result<SqlitePool> {
    std::fs::create_dir_all(index_dir).with_context(|| {
        format!("Failed to create index directory: {}", index_dir.display())
    })?;
    let db_path = index_dir.join(INDEX_FILE);

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Lazily opened, process-wide handle to the on-disk index.
///
/// The first [`open`](IndexHandle::open) connects and migrates; every later
/// call returns the same `Arc`. Concurrent first calls wait on a single
/// initialization.
pub struct IndexHandle {
    index_dir: PathBuf,
    collection: String,
    score_threshold: Option<f32>,
    cell: OnceCell<Arc<SqliteIndex>>,
}

impl IndexHandle {
    pub fn new(index_dir: impl Into<PathBuf>, collection: impl Into<String>) -> Self {
        Self {
            index_dir: index_dir.into(),
            collection: collection.into(),
            score_threshold: None,
            cell: OnceCell::new(),
        }
    }

    pub fn with_score_threshold(mut self, threshold: Option<f32>) -> Self {
        self.score_threshold = threshold;
        self
    }

    pub async fn open(&self) -> Result<Arc<SqliteIndex>, IndexError> {
        let index = self
            .cell
            .get_or_try_init(|| async {
                let unavailable = |e: anyhow::Error| {
                    IndexError::Unavailable(format!("{}: {:#}", self.index_dir.display(), e))
                };
                let pool = connect(&self.index_dir).await.map_err(unavailable)?;
                migrate::run_migrations(&pool).await.map_err(unavailable)?;
                tracing::debug!(dir = %self.index_dir.display(), "index opened");
                Ok::<_, IndexError>(Arc::new(
                    SqliteIndex::new(pool, self.collection.clone())
                        .with_score_threshold(self.score_threshold),
                ))
            })
            .await?;
        Ok(Arc::clone(index))
    }
}

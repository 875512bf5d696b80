//! # Corpus Harness
//!
//! A local-first question answering harness that answers strictly from a
//! private document corpus, citing the passages it used.
//!
//! Documents (`.txt`, `.csv`, `.html`) are normalized, split into
//! overlapping token windows, embedded, and stored in an on-disk vector
//! index. Questions are embedded the same way, the nearest chunks are
//! retrieved, and an answer is generated from those chunks alone.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌────────────┐
//! │ Documents  │──▶│ Clean+Chunk  │──▶│  SQLite     │
//! │ txt/csv/htm│   │ +Embed       │   │ vector index│
//! └────────────┘   └──────────────┘   └─────┬──────┘
//!                                           │ top-k
//!                                           ▼
//!                  ┌──────────────┐   ┌────────────┐
//!                  │  Generator   │◀──│ Retriever  │
//!                  │ LLM/fallback │   └────────────┘
//!                  └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! corpus init
//! corpus add ./data/uploads/contract.txt
//! corpus ask "How long does the non-compete last?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration, provider precedence |
//! | [`extract`] | Document reading (txt, csv, html) |
//! | [`db`] | Database connection and the shared index handle |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | Disk-resident vector index |
//! | [`transport`] | HTTP seam for remote backends |
//! | [`retry`] | Backoff and retry classification |
//! | [`embedding`] | Embedding backends |
//! | [`generation`] | Grounded answer generation |
//! | [`providers`] | One-time backend selection |
//! | [`rag`] | Ingestion, retrieval, and answering pipeline |
//! | [`history`] | Conversation log |

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod history;
pub mod migrate;
pub mod providers;
pub mod rag;
pub mod retry;
pub mod sqlite_store;
pub mod transport;

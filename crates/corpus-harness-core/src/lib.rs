//! # Corpus Harness Core
//!
//! I/O-free logic for Corpus Harness: data models, text normalization,
//! token-window chunking, the embedding and vector-store traits, an
//! in-memory store, and grounded-answer composition (context building,
//! citations, and the extractive fallback answer).
//!
//! This crate performs no filesystem, database, or network I/O. The
//! `corpus-harness` app crate supplies the SQLite index, the HTTP-backed
//! providers, and the CLI.

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod models;
pub mod normalize;
pub mod store;

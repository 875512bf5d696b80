//! Core data models used throughout Corpus Harness.
//!
//! These types represent the chunks, index records, and retrieval hits
//! that flow through the ingestion and answering pipeline.

use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Input formats the document reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.txt`
    Plain,
    /// `.csv`
    Tabular,
    /// `.html` / `.htm`
    Markup,
}

impl DocumentFormat {
    /// Detect the format from a file extension (case-insensitive, no dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(Self::Plain),
            "csv" => Some(Self::Tabular),
            "html" | "htm" => Some(Self::Markup),
            _ => None,
        }
    }
}

/// Stable record identifier derived from `(source, chunk_index)`.
///
/// The first 64 bits of `SHA-256("{source}-{index}")`, rendered as 16
/// lowercase hex digits. Re-ingesting a document at the same chunk
/// boundaries produces the same ids, so records are overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointId(u64);

impl PointId {
    pub fn for_chunk(source: &str, index: usize) -> Self {
        let digest = Sha256::digest(format!("{}-{}", source, index).as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Self(u64::from_be_bytes(prefix))
    }

    /// Parse the 16-hex-digit form produced by [`Display`](fmt::Display).
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 16 {
            return None;
        }
        u64::from_str_radix(hex, 16).ok().map(Self)
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for PointId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A chunk of a document's normalized text, before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Owning document path/identifier.
    pub source: String,
    /// Basename of `source`, used in citations.
    pub filename: String,
    /// 0-based position within the document.
    pub index: usize,
    pub text: String,
}

impl Chunk {
    pub fn point_id(&self) -> PointId {
        PointId::for_chunk(&self.source, self.index)
    }

    /// Attach an embedding vector, producing an index record.
    pub fn into_point(self, vector: Vec<f32>) -> Point {
        Point {
            id: self.point_id(),
            vector,
            payload: Payload {
                source: self.source,
                filename: self.filename,
                chunk_index: self.index,
                text: self.text,
            },
        }
    }
}

/// Payload stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub source: String,
    pub filename: String,
    pub chunk_index: usize,
    pub text: String,
}

/// An `(id, vector, payload)` record owned by the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: PointId,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A record returned from nearest-neighbor search.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: PointId,
    /// Cosine similarity to the query vector.
    pub score: f32,
    pub payload: Payload,
}

/// Citation metadata carried by a [`RetrievalHit`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitMeta {
    pub source: String,
    pub filename: String,
    pub chunk_index: usize,
    pub score: f32,
}

/// A ranked passage returned by the retriever. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    pub id: PointId,
    pub text: String,
    pub meta: HitMeta,
}

impl From<ScoredPoint> for RetrievalHit {
    fn from(point: ScoredPoint) -> Self {
        Self {
            id: point.id,
            text: point.payload.text,
            meta: HitMeta {
                source: point.payload.source,
                filename: point.payload.filename,
                chunk_index: point.payload.chunk_index,
                score: point.score,
            },
        }
    }
}

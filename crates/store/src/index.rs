//! In-memory vector index backed by a JSON-lines export.
//!
//! Each line of the file is one `IndexedChunk`. The index is read once at
//! startup and is read-only afterwards.

use std::path::Path;

use kbchat_core::error::RetrievalError;
use kbchat_core::retrieval::RetrievedDocument;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::vector;

/// One embedded document chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    #[serde(default)]
    pub id: String,

    pub content: String,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    pub embedding: Vec<f32>,
}

#[derive(Debug, Default)]
pub struct VectorIndex {
    chunks: Vec<IndexedChunk>,
}

impl VectorIndex {
    pub fn from_chunks(chunks: Vec<IndexedChunk>) -> Self {
        Self { chunks }
    }

    /// Load chunks from a JSONL file.
    ///
    /// A missing file gives an empty index. Corrupted lines are skipped.
    pub fn load(path: &Path) -> Result<Self, RetrievalError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Vector index not found, starting empty");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(RetrievalError::Store(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let chunks: Vec<IndexedChunk> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<IndexedChunk>(line) {
                Ok(chunk) => Some(chunk),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted index line");
                    None
                }
            })
            .collect();

        debug!(path = %path.display(), count = chunks.len(), "Vector index loaded");
        Ok(Self { chunks })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The `limit` chunks most similar to `query`, best first.
    pub fn search(&self, query: &[f32], limit: usize, min_score: f32) -> Vec<RetrievedDocument> {
        vector::top_k(
            self.chunks.iter().map(|c| c.embedding.as_slice()),
            query,
            limit,
            min_score,
        )
        .into_iter()
        .map(|(i, score)| {
            let chunk = &self.chunks[i];
            RetrievedDocument {
                content: chunk.content.clone(),
                metadata: chunk.metadata.clone(),
                score,
            }
        })
        .collect()
    }
}

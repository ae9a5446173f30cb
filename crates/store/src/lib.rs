//! Retrieval for kbchat.
//!
//! - [`index::VectorIndex`] — in-memory chunks loaded from a JSONL export
//! - [`retriever::EmbeddingRetriever`] — query embedding + top-k search
//! - [`qa::StuffedQa`] — answers a question from all retrieved chunks at once

pub mod index;
pub mod qa;
pub mod retriever;
pub mod vector;

pub use index::{IndexedChunk, VectorIndex};
pub use qa::StuffedQa;
pub use retriever::EmbeddingRetriever;

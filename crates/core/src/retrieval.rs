//! Retrieval collaborator traits.
//!
//! A `Retriever` finds the documents relevant to a query. A `KnowledgeBase`
//! answers a question from those documents and reports which ones it used.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// Answer text a knowledge base gives when nothing relevant is found.
pub const UNKNOWN_ANSWER: &str = "I don't know.";

/// A document chunk returned by retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Chunk text
    pub content: String,

    /// Free-form metadata; `source` holds the originating file path
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Similarity score (set by search)
    #[serde(default)]
    pub score: f32,
}

impl RetrievedDocument {
    /// The originating file path, if recorded.
    pub fn source(&self) -> Option<&str> {
        self.metadata
            .get("source")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// A question answered from retrieved documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaAnswer {
    pub result: String,

    #[serde(default)]
    pub source_documents: Vec<RetrievedDocument>,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return the documents most relevant to `query`, best first.
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedDocument>, RetrievalError>;
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Answer `query` from the indexed documents.
    async fn ask(&self, query: &str) -> Result<QaAnswer, RetrievalError>;
}

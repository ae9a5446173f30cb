//! Embedding-based retriever over a [`VectorIndex`].

use std::sync::Arc;

use async_trait::async_trait;
use kbchat_core::error::RetrievalError;
use kbchat_core::provider::{EmbeddingRequest, Provider};
use kbchat_core::retrieval::{RetrievedDocument, Retriever};

use crate::index::VectorIndex;

pub struct EmbeddingRetriever {
    embedder: Arc<dyn Provider>,
    model: String,
    index: Arc<VectorIndex>,
    top_k: usize,
    min_score: f32,
}

impl EmbeddingRetriever {
    pub fn new(
        embedder: Arc<dyn Provider>,
        model: impl Into<String>,
        index: Arc<VectorIndex>,
        top_k: usize,
        min_score: f32,
    ) -> Self {
        Self {
            embedder,
            model: model.into(),
            index,
            top_k,
            min_score,
        }
    }
}

#[async_trait]
impl Retriever for EmbeddingRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .embedder
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: vec![query.to_string()],
            })
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

        let query_embedding = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Embedding("empty embedding response".into()))?;

        let docs = self.index.search(&query_embedding, self.top_k, self.min_score);
        tracing::debug!(query, hits = docs.len(), "Retrieved documents");
        Ok(docs)
    }
}

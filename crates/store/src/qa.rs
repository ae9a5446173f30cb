//! "Stuff" question answering: every retrieved chunk goes into one prompt.

use std::sync::Arc;

use async_trait::async_trait;
use kbchat_core::error::RetrievalError;
use kbchat_core::message::Message;
use kbchat_core::provider::{Provider, ProviderRequest, ToolChoice};
use kbchat_core::retrieval::{KnowledgeBase, QaAnswer, RetrievedDocument, Retriever, UNKNOWN_ANSWER};

const QA_SYSTEM_PROMPT: &str = "Use the following pieces of context to answer the user's question. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n";

pub struct StuffedQa {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn Provider>,
    model: String,
    temperature: f32,
}

impl StuffedQa {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        llm: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            retriever,
            llm,
            model: model.into(),
            temperature,
        }
    }

    fn prompt(query: &str, docs: &[RetrievedDocument]) -> Vec<Message> {
        let context = docs
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        vec![
            Message::system(format!("{QA_SYSTEM_PROMPT}{context}")),
            Message::user(query),
        ]
    }
}

#[async_trait]
impl KnowledgeBase for StuffedQa {
    async fn ask(&self, query: &str) -> Result<QaAnswer, RetrievalError> {
        let docs = self.retriever.retrieve(query).await?;
        if docs.is_empty() {
            tracing::debug!(query, "Nothing retrieved");
            return Ok(QaAnswer {
                result: UNKNOWN_ANSWER.to_string(),
                source_documents: Vec::new(),
            });
        }

        let response = self
            .llm
            .complete(ProviderRequest {
                model: self.model.clone(),
                messages: Self::prompt(query, &docs),
                temperature: self.temperature,
                max_tokens: None,
                tools: Vec::new(),
                tool_choice: ToolChoice::None,
                stream: false,
            })
            .await
            .map_err(|e| RetrievalError::Answer(e.to_string()))?;

        Ok(QaAnswer {
            result: response.message.content.trim().to_string(),
            source_documents: docs,
        })
    }
}

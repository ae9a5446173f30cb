//! Wires configuration into a ready agent.

use std::sync::Arc;

use kbchat_config::AppConfig;
use kbchat_core::event::EventBus;
use kbchat_core::provider::Provider;
use kbchat_store::{EmbeddingRetriever, StuffedQa, VectorIndex};
use kbchat_tools::{ToolDeps, default_registry};
use tracing::info;

use crate::loop_runner::AgentExecutor;

/// Build the agent and its collaborators around a given chat provider.
pub fn build_agent_with(
    config: &AppConfig,
    llm: Arc<dyn Provider>,
    embedder: Arc<dyn Provider>,
    event_bus: Arc<EventBus>,
) -> kbchat_core::Result<AgentExecutor> {
    let index = Arc::new(VectorIndex::load(&config.retrieval.index_path)?);
    info!(
        path = %config.retrieval.index_path.display(),
        chunks = index.len(),
        "Vector index loaded"
    );

    let retriever = Arc::new(EmbeddingRetriever::new(
        embedder,
        config.embedding.model.clone(),
        index,
        config.retrieval.top_k,
        config.retrieval.min_score,
    ));
    let knowledge_base = Arc::new(StuffedQa::new(
        retriever,
        llm.clone(),
        config.llm.model.clone(),
        config.llm.temperature,
    ));
    let tools = default_registry(
        config,
        ToolDeps {
            knowledge_base,
            llm: llm.clone(),
        },
    );
    info!(tools = ?tools.names(), "Tool registry ready");

    Ok(AgentExecutor::from_config(config, llm, Arc::new(tools), event_bus))
}

/// Build the agent with the configured OpenAI-compatible providers.
pub fn build_agent(config: &AppConfig, event_bus: Arc<EventBus>) -> kbchat_core::Result<AgentExecutor> {
    let llm = kbchat_providers::build_chat_provider(config)?;
    let embedder = kbchat_providers::build_embedding_provider(config)?;
    build_agent_with(config, llm, embedder, event_bus)
}

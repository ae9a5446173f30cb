//! LLM provider implementations for kbchat.
//!
//! All providers implement the `kbchat_core::Provider` trait. The builders
//! below turn the `llm` / `embedding` / `proxy` configuration sections into
//! ready-to-use providers.

pub mod openai_compat;

use std::sync::Arc;

use kbchat_config::AppConfig;
use kbchat_core::Provider;
use kbchat_core::error::ProviderError;

pub use openai_compat::{ClientOptions, OPENAI_BASE_URL, OpenAiCompatProvider};

fn client_options(config: &AppConfig) -> ClientOptions {
    let proxy = config.proxy.url();
    if proxy.is_some() {
        tracing::info!(host = %config.proxy.host, "Using HTTP proxy for model requests");
    }
    ClientOptions {
        proxy,
        ..ClientOptions::default()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Build the chat-completion provider from the `llm` section.
pub fn build_chat_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = non_blank(&config.llm.api_key).ok_or_else(|| {
        ProviderError::NotConfigured(
            "no LLM API key (set llm.api_key, KBCHAT_API_KEY or OPENAI_API_KEY)".into(),
        )
    })?;
    let base_url = non_blank(&config.llm.base_url).unwrap_or(OPENAI_BASE_URL);
    let provider =
        OpenAiCompatProvider::new("openai", base_url, api_key, &client_options(config))?;
    tracing::debug!(base_url, model = %config.llm.model, "Chat provider ready");
    Ok(Arc::new(provider))
}

/// Build the embedding provider from the `embedding` section.
///
/// The embedding key falls back to the LLM key when not set.
pub fn build_embedding_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.embedding_api_key().ok_or_else(|| {
        ProviderError::NotConfigured("no embedding API key configured".into())
    })?;
    let base_url = non_blank(&config.embedding.base_url).unwrap_or(OPENAI_BASE_URL);
    let provider =
        OpenAiCompatProvider::new("openai-embeddings", base_url, api_key, &client_options(config))?;
    tracing::debug!(base_url, model = %config.embedding.model, "Embedding provider ready");
    Ok(Arc::new(provider))
}

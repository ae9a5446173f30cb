//! Built-in tools for the kbchat agent.
//!
//! - `project_documents` — answers from the knowledge base and cites sources
//! - `generate_diagram` — turns document text into a Mermaid diagram
//! - `final_answer` — the terminal tool that ends a turn

pub mod downloads;
pub mod final_answer;
pub mod generate_diagram;
pub mod project_documents;

use std::sync::Arc;

use kbchat_config::AppConfig;
use kbchat_core::provider::Provider;
use kbchat_core::retrieval::KnowledgeBase;
use kbchat_core::tool::ToolRegistry;

pub use downloads::{DownloadError, DownloadResolver, FileEntry, display_name};
pub use final_answer::FinalAnswerTool;
pub use generate_diagram::{FALLBACK_DIAGRAM, GenerateDiagramTool, normalize_mermaid};
pub use project_documents::ProjectDocumentsTool;

/// Collaborators the built-in tools need.
pub struct ToolDeps {
    pub knowledge_base: Arc<dyn KnowledgeBase>,
    pub llm: Arc<dyn Provider>,
}

/// Create the default tool registry with all built-in tools.
pub fn default_registry(config: &AppConfig, deps: ToolDeps) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ProjectDocumentsTool::new(
        deps.knowledge_base,
        DownloadResolver::new(config.data.public_dir.clone()),
        config.server.base_url(),
        config.retrieval.demo_fallback,
    )));
    registry.register(Box::new(GenerateDiagramTool::new(
        deps.llm,
        config.llm.model.clone(),
        config.llm.temperature,
    )));
    registry.register(Box::new(FinalAnswerTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kbchat_core::error::{ProviderError, RetrievalError};
    use kbchat_core::provider::{ProviderRequest, ProviderResponse};
    use kbchat_core::retrieval::QaAnswer;

    struct NoKb;

    #[async_trait]
    impl KnowledgeBase for NoKb {
        async fn ask(&self, _query: &str) -> Result<QaAnswer, RetrievalError> {
            Err(RetrievalError::Store("unused".into()))
        }
    }

    struct NoLlm;

    #[async_trait]
    impl Provider for NoLlm {
        fn name(&self) -> &str {
            "none"
        }
        async fn complete(&self, _r: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("unused".into()))
        }
    }

    #[test]
    fn registry_has_three_sorted_tools() {
        let registry = default_registry(
            &AppConfig::default(),
            ToolDeps {
                knowledge_base: Arc::new(NoKb),
                llm: Arc::new(NoLlm),
            },
        );
        assert_eq!(
            registry.names(),
            vec!["final_answer", "generate_diagram", "project_documents"]
        );
    }
}

//! Project documents tool — answers from the indexed knowledge base and
//! cites its sources with download links.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use kbchat_core::error::ToolError;
use kbchat_core::retrieval::{KnowledgeBase, QaAnswer, UNKNOWN_ANSWER};
use kbchat_core::tool::{Tool, ToolOutput};

use crate::downloads::{DownloadResolver, display_name};

pub struct ProjectDocumentsTool {
    knowledge_base: Arc<dyn KnowledgeBase>,
    resolver: DownloadResolver,
    base_url: String,
    demo_fallback: bool,
}

impl ProjectDocumentsTool {
    pub fn new(
        knowledge_base: Arc<dyn KnowledgeBase>,
        resolver: DownloadResolver,
        base_url: impl Into<String>,
        demo_fallback: bool,
    ) -> Self {
        Self {
            knowledge_base,
            resolver,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            demo_fallback,
        }
    }

    fn download_url(&self, relative: &str) -> String {
        format!("{}/download?filename={relative}", self.base_url)
    }

    /// Answer text followed by one line per distinct source.
    fn render(&self, answer: &QaAnswer) -> String {
        let mut output = format!("{}\n\nSources:", answer.result);
        let mut seen_paths = HashSet::new();
        let mut seen_names = HashSet::new();

        for doc in &answer.source_documents {
            let Some(source) = doc.source() else {
                continue;
            };
            let name = display_name(source);
            if seen_paths.contains(source) || seen_names.contains(&name) {
                continue;
            }
            seen_paths.insert(source.to_string());
            seen_names.insert(name.clone());

            match self.resolver.resolve(source) {
                Some(relative) => {
                    output.push_str(&format!(
                        "\n📄 <a href=\"{}\">{name}</a>",
                        self.download_url(&relative)
                    ));
                }
                None => {
                    output.push_str(&format!("\n📄 {name} *(not available for download)*"));
                }
            }
        }
        output
    }

    fn wants_demo(query: &str) -> bool {
        let lower = query.to_lowercase();
        query.contains("HelloAI") || lower.contains("hello") || lower.contains("requirement")
    }

    fn demo_answer(&self) -> String {
        let v1 = "HelloAIForAMS_Requirement_v0.1.xlsx";
        let v2 = "HelloAIForAMS_Requirement_v0.2.xlsx";
        format!(
            "HelloAI is an AI-powered Asset Management System (AMS) designed to provide \
intelligent assistance for asset tracking and management.

## Key Features
- AI-powered asset analysis and monitoring
- Automated reporting and notifications
- Real-time asset tracking
- Integration with existing enterprise systems

## Documentation
The complete system requirements and specifications are available in the following documents:

Sources:
📄 [{v1}]({})
📄 [{v2}]({})",
            self.download_url(v1),
            self.download_url(v2)
        )
    }
}

#[async_trait]
impl Tool for ProjectDocumentsTool {
    fn name(&self) -> &str {
        "project_documents"
    }

    fn description(&self) -> &str {
        "Use this tool to search the project documents in the knowledge base."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The question to look up in the project documents"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let answer = self
            .knowledge_base
            .ask(query)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        let output = if !answer.result.is_empty() && answer.result != UNKNOWN_ANSWER {
            self.render(&answer)
        } else if self.demo_fallback && Self::wants_demo(query) {
            tracing::debug!(query, "No documents found, using demo answer");
            self.demo_answer()
        } else {
            format!("{}\n\nSources:", answer.result)
        };

        Ok(ToolOutput::text(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbchat_core::error::RetrievalError;
    use kbchat_core::retrieval::RetrievedDocument;

    struct CannedKb(QaAnswer);

    #[async_trait]
    impl KnowledgeBase for CannedKb {
        async fn ask(&self, _query: &str) -> Result<QaAnswer, RetrievalError> {
            Ok(self.0.clone())
        }
    }

    fn doc(source: &str) -> RetrievedDocument {
        let mut metadata = serde_json::Map::new();
        metadata.insert("source".into(), serde_json::json!(source));
        RetrievedDocument {
            content: "chunk".into(),
            metadata,
            score: 1.0,
        }
    }

    fn tool(answer: QaAnswer, public_dir: &std::path::Path, demo: bool) -> ProjectDocumentsTool {
        ProjectDocumentsTool::new(
            Arc::new(CannedKb(answer)),
            DownloadResolver::new(public_dir),
            "http://localhost:8000",
            demo,
        )
    }

    async fn run(tool: &ProjectDocumentsTool, query: &str) -> String {
        tool.execute(serde_json::json!({ "query": query }))
            .await
            .unwrap()
            .content
    }

    #[tokio::test]
    async fn cites_sources_once_with_links() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Architecture.pptx"), b"x").unwrap();

        let answer = QaAnswer {
            result: "The system has three tiers.".into(),
            source_documents: vec![
                doc("out/markdown/Architecture.pptx.md"),
                doc("out/markdown/Architecture.pptx.md"),
                doc("other/markdown/Architecture.pptx.md"),
                doc("out/markdown/data_raw_data_Minutes.docx.md"),
            ],
        };
        let output = run(&tool(answer, dir.path(), true), "architecture").await;

        assert_eq!(
            output,
            "The system has three tiers.\n\nSources:\
\n📄 <a href=\"http://localhost:8000/download?filename=Architecture.pptx\">Architecture.pptx</a>\
\n📄 Minutes.docx *(not available for download)*"
        );
    }

    #[tokio::test]
    async fn demo_fallback_for_hello_queries() {
        let dir = tempfile::tempdir().unwrap();
        let answer = QaAnswer {
            result: UNKNOWN_ANSWER.into(),
            source_documents: vec![],
        };
        let output = run(&tool(answer, dir.path(), true), "Tell me about HelloAI").await;

        assert!(output.starts_with("HelloAI is an AI-powered Asset Management System"));
        assert_eq!(output.matches("/download?filename=").count(), 2);
        assert!(output.contains("HelloAIForAMS_Requirement_v0.1.xlsx"));
        assert!(output.contains("HelloAIForAMS_Requirement_v0.2.xlsx"));
    }

    #[tokio::test]
    async fn sentinel_without_demo_match() {
        let dir = tempfile::tempdir().unwrap();
        let answer = QaAnswer {
            result: UNKNOWN_ANSWER.into(),
            source_documents: vec![],
        };
        let output = run(&tool(answer.clone(), dir.path(), true), "pricing plans").await;
        assert_eq!(output, "I don't know.\n\nSources:");

        let output = run(&tool(answer, dir.path(), false), "hello").await;
        assert_eq!(output, "I don't know.\n\nSources:");
    }

    #[tokio::test]
    async fn missing_query_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let answer = QaAnswer {
            result: String::new(),
            source_documents: vec![],
        };
        let err = tool(answer, dir.path(), true)
            .execute(serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn knowledge_base_failure_is_execution_error() {
        struct Broken;

        #[async_trait]
        impl KnowledgeBase for Broken {
            async fn ask(&self, _query: &str) -> Result<QaAnswer, RetrievalError> {
                Err(RetrievalError::Store("index offline".into()))
            }
        }

        let tool = ProjectDocumentsTool::new(
            Arc::new(Broken),
            DownloadResolver::new("/nonexistent"),
            "http://localhost:8000",
            true,
        );
        let err = tool
            .execute(serde_json::json!({"query": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("index offline"));
    }
}

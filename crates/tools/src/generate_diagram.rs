//! Mermaid diagram generation from document content.

use std::sync::Arc;

use async_trait::async_trait;
use kbchat_core::error::ToolError;
use kbchat_core::message::Message;
use kbchat_core::provider::{Provider, ProviderRequest, ToolChoice};
use kbchat_core::tool::{Tool, ToolOutput};

/// Returned when the model fails or produces too little to draw.
pub const FALLBACK_DIAGRAM: &str = "graph TD\n    A[System] --> B[Component]\n    B --> C[Database]";

const DIAGRAM_PROMPT: &str = "You are a system architecture expert. Create a system diagram using **Mermaid** syntax.

Requirements:
- Only use English labels
- Use proper Mermaid syntax for version 10.9.4
- Start with graph TD (top-down layout)
- Use proper node syntax: A[Label] or A(Label) or A{Label}
- Use proper arrow syntax: --> or ---
- Keep node IDs simple (A, B, C, etc.)
- Ensure all connections are valid
- Only return the Mermaid code, no explanations

Example format:
```mermaid
graph TD
    A[User Interface] --> B[API Gateway]
    B --> C[Business Logic]
    C --> D[Database]
```

Content to diagram:
";

pub struct GenerateDiagramTool {
    llm: Arc<dyn Provider>,
    model: String,
    temperature: f32,
}

impl GenerateDiagramTool {
    pub fn new(llm: Arc<dyn Provider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            llm,
            model: model.into(),
            temperature,
        }
    }
}

/// Clean model output into Mermaid source.
///
/// Strips code fences, makes sure a `graph` declaration leads, trims and
/// drops blank lines, pads `-->` and `---` with spaces and collapses runs of
/// spaces. Fewer than two lines left gives [`FALLBACK_DIAGRAM`].
pub fn normalize_mermaid(raw: &str) -> String {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```mermaid")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let content = unfenced.strip_suffix("```").unwrap_or(unfenced).trim();

    let content = if content.starts_with("graph") {
        content.to_string()
    } else {
        format!("graph TD\n{content}")
    };

    let lines: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let spaced = line.replace("-->", " --> ").replace("---", " --- ");
            spaced.split(' ').filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ")
        })
        .collect();

    if lines.len() < 2 {
        return FALLBACK_DIAGRAM.to_string();
    }
    lines.join("\n")
}

#[async_trait]
impl Tool for GenerateDiagramTool {
    fn name(&self) -> &str {
        "generate_diagram"
    }

    fn description(&self) -> &str {
        "Generate a system diagram in Mermaid syntax from given documentation or code analysis."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "doc_content": {
                    "type": "string",
                    "description": "Documentation text describing the system to draw"
                }
            },
            "required": ["doc_content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let doc_content = arguments["doc_content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'doc_content' argument".into()))?;

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::user(format!(
                "{DIAGRAM_PROMPT}{doc_content}\n\nGenerate valid Mermaid syntax only:"
            ))],
            temperature: self.temperature,
            max_tokens: None,
            tools: Vec::new(),
            tool_choice: ToolChoice::None,
            stream: false,
        };

        let diagram = match self.llm.complete(request).await {
            Ok(response) => normalize_mermaid(&response.message.content),
            Err(e) => {
                tracing::warn!(error = %e, "Diagram generation failed, using fallback");
                FALLBACK_DIAGRAM.to_string()
            }
        };

        Ok(ToolOutput::text(diagram))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbchat_core::error::ProviderError;
    use kbchat_core::provider::ProviderResponse;

    struct Reply(Result<String, ProviderError>);

    #[async_trait]
    impl Provider for Reply {
        fn name(&self) -> &str {
            "reply"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let content = self.0.clone()?;
            Ok(ProviderResponse {
                message: Message::assistant(content),
                usage: None,
                model: request.model,
            })
        }
    }

    #[test]
    fn strips_fences_and_normalizes_arrows() {
        let raw = "```mermaid\ngraph TD\n   A[UI]-->B[API]\n\n  B  ---   C[DB]\n```";
        assert_eq!(
            normalize_mermaid(raw),
            "graph TD\nA[UI] --> B[API]\nB --- C[DB]"
        );
    }

    #[test]
    fn adds_graph_declaration() {
        assert_eq!(normalize_mermaid("A --> B"), "graph TD\nA --> B");
    }

    #[test]
    fn too_short_falls_back() {
        assert_eq!(normalize_mermaid("graph TD"), FALLBACK_DIAGRAM);
        assert_eq!(normalize_mermaid("```\n```"), FALLBACK_DIAGRAM);
    }

    #[tokio::test]
    async fn provider_failure_falls_back() {
        let tool = GenerateDiagramTool::new(
            Arc::new(Reply(Err(ProviderError::Timeout("slow".into())))),
            "gpt-4o",
            0.0,
        );
        let out = tool
            .execute(serde_json::json!({"doc_content": "three tiers"}))
            .await
            .unwrap();
        assert_eq!(out.content, FALLBACK_DIAGRAM);
    }

    #[tokio::test]
    async fn model_output_is_cleaned() {
        let tool = GenerateDiagramTool::new(
            Arc::new(Reply(Ok("graph LR\nWeb-->Api".into()))),
            "gpt-4o",
            0.0,
        );
        let out = tool
            .execute(serde_json::json!({"doc_content": "web talks to api"}))
            .await
            .unwrap();
        assert_eq!(out.content, "graph LR\nWeb --> Api");
    }
}

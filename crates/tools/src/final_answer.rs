//! The terminal tool: hands the final answer back to the user.

use async_trait::async_trait;
use kbchat_core::agent::FinalAnswer;
use kbchat_core::error::ToolError;
use kbchat_core::tool::{Tool, ToolOutput};

pub struct FinalAnswerTool;

#[async_trait]
impl Tool for FinalAnswerTool {
    fn name(&self) -> &str {
        "final_answer"
    }

    fn description(&self) -> &str {
        "Use this tool to provide a final answer to the user."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "string",
                    "description": "The complete answer, keeping markdown and download links intact"
                },
                "tools_used": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Names of the tools used to produce the answer"
                }
            },
            "required": ["answer", "tools_used"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let answer = arguments["answer"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'answer' argument".into()))?;

        let tools_used = match &arguments["tools_used"] {
            serde_json::Value::Null => Vec::new(),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|v| {
                    v.as_str().map(String::from).ok_or_else(|| {
                        ToolError::InvalidArguments("'tools_used' must be a list of strings".into())
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => {
                return Err(ToolError::InvalidArguments(
                    "'tools_used' must be a list of strings".into(),
                ));
            }
        };

        let payload = FinalAnswer::new(answer, tools_used);
        let data = serde_json::to_value(&payload).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })?;

        Ok(ToolOutput {
            content: data.to_string(),
            data: Some(data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_structured_answer() {
        let out = FinalAnswerTool
            .execute(serde_json::json!({
                "answer": "HelloAI is an AMS assistant.",
                "tools_used": ["project_documents"]
            }))
            .await
            .unwrap();

        let data: FinalAnswer = serde_json::from_value(out.data.unwrap()).unwrap();
        assert_eq!(data.answer, "HelloAI is an AMS assistant.");
        assert_eq!(data.tools_used, vec!["project_documents"]);

        let content: FinalAnswer = serde_json::from_str(&out.content).unwrap();
        assert_eq!(content, data);
    }

    #[tokio::test]
    async fn tools_used_may_be_omitted() {
        let out = FinalAnswerTool
            .execute(serde_json::json!({"answer": "42"}))
            .await
            .unwrap();
        assert_eq!(out.data.unwrap()["tools_used"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn rejects_bad_arguments() {
        assert!(FinalAnswerTool.execute(serde_json::json!({})).await.is_err());
        assert!(
            FinalAnswerTool
                .execute(serde_json::json!({"answer": "a", "tools_used": "x"}))
                .await
                .is_err()
        );
    }
}

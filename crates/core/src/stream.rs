//! Streaming event types shared by providers, the agent loop and the HTTP layer.

use serde::{Deserialize, Serialize};

/// One incremental piece of a model response.
///
/// OpenAI-style streams send the call id and name only on the first delta
/// of a tool call; later deltas carry argument text alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Raw chunk of the tool-call arguments JSON text
    #[serde(default)]
    pub arguments: String,

    /// Freeform text the model emitted outside any tool call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl TokenFragment {
    /// A fragment carrying plain text only.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// A fragment of a tool call.
    pub fn tool_call(id: Option<String>, name: Option<String>, arguments: impl Into<String>) -> Self {
        Self {
            tool_call_id: id,
            name,
            arguments: arguments.into(),
            text: None,
        }
    }

    /// A continuation chunk with no id or name.
    pub fn arguments(arguments: impl Into<String>) -> Self {
        Self::tool_call(None, None, arguments)
    }

    /// The call id, if present and non-empty.
    pub fn call_id(&self) -> Option<&str> {
        self.tool_call_id.as_deref().filter(|id| !id.is_empty())
    }

    /// True when the fragment carries no tool-call payload.
    pub fn is_tool_payload_empty(&self) -> bool {
        self.call_id().is_none()
            && self.name.as_deref().is_none_or(str::is_empty)
            && self.arguments.is_empty()
    }

    /// True when the fragment carries nothing at all.
    pub fn is_empty(&self) -> bool {
        self.is_tool_payload_empty() && self.text.as_deref().is_none_or(str::is_empty)
    }
}

/// What flows through the event queue during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Token(TokenFragment),
    /// A model cycle finished without calling the terminal tool
    StepEnd,
    /// The terminal tool was called; nothing follows
    Done,
}

impl StreamEvent {
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, StreamEvent::Token(_))
    }
}

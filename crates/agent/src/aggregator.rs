//! Reassembles streamed tool-call fragments into complete [`ToolCall`]s.
//!
//! A fragment with a call id opens a new pending call. A fragment without one
//! continues the most recently opened call. Arguments are only parsed once the
//! stream has ended.

use kbchat_core::stream::TokenFragment;
use kbchat_core::tool::ToolCall;
use tracing::warn;

/// A pending call whose arguments could not be turned into a JSON object.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("malformed tool call '{name}' ({id}): {reason}")]
pub struct MalformedToolCall {
    pub id: String,
    pub name: String,
    /// The raw argument text as it arrived
    pub arguments: String,
    pub reason: String,
}

#[derive(Debug)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// What one model response contained once the stream finished.
#[derive(Debug, Default)]
pub struct AggregatedResponse {
    /// Complete calls, in the order they were started
    pub calls: Vec<ToolCall>,
    pub malformed: Vec<MalformedToolCall>,
    /// Freeform text outside any tool call
    pub text: String,
}

#[derive(Debug, Default)]
pub struct ToolCallAggregator {
    pending: Vec<PendingCall>,
    text: String,
    orphaned: usize,
}

impl ToolCallAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &TokenFragment) {
        if fragment.is_empty() {
            return;
        }
        if let Some(text) = fragment.text.as_deref() {
            self.text.push_str(text);
        }

        if let Some(id) = fragment.call_id() {
            self.pending.push(PendingCall {
                id: id.to_string(),
                name: fragment.name.clone().unwrap_or_default(),
                arguments: fragment.arguments.clone(),
            });
            return;
        }
        if fragment.is_tool_payload_empty() {
            return;
        }

        match self.pending.last_mut() {
            Some(call) => {
                if call.name.is_empty() {
                    if let Some(name) = fragment.name.as_deref() {
                        call.name.push_str(name);
                    }
                }
                call.arguments.push_str(&fragment.arguments);
            }
            None => self.orphaned += 1,
        }
    }

    /// Number of calls started so far.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn finish(self) -> AggregatedResponse {
        if self.orphaned > 0 {
            warn!(
                fragments = self.orphaned,
                "Dropped argument fragments that arrived before any tool call"
            );
        }

        let mut response = AggregatedResponse {
            text: self.text,
            ..Default::default()
        };

        for pending in self.pending {
            match parse_pending(&pending, &response.calls) {
                Ok(call) => response.calls.push(call),
                Err(reason) => {
                    let malformed = MalformedToolCall {
                        id: pending.id,
                        name: pending.name,
                        arguments: pending.arguments,
                        reason,
                    };
                    warn!(error = %malformed, "Dropping tool call");
                    response.malformed.push(malformed);
                }
            }
        }
        response
    }
}

fn parse_pending(pending: &PendingCall, finished: &[ToolCall]) -> Result<ToolCall, String> {
    if pending.name.trim().is_empty() {
        return Err("missing tool name".into());
    }
    if finished.iter().any(|c| c.id == pending.id) {
        return Err("duplicate call id".into());
    }

    let raw = pending.arguments.trim();
    let arguments = if raw.is_empty() {
        serde_json::Map::new()
    } else {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(other) => return Err(format!("arguments are not an object: {other}")),
            Err(e) => return Err(e.to_string()),
        }
    };

    Ok(ToolCall {
        id: pending.id.clone(),
        name: pending.name.clone(),
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(id: &str, name: &str, args: &str) -> TokenFragment {
        TokenFragment::tool_call(Some(id.into()), Some(name.into()), args)
    }

    fn aggregate(fragments: &[TokenFragment]) -> AggregatedResponse {
        let mut aggregator = ToolCallAggregator::new();
        for fragment in fragments {
            aggregator.push(fragment);
        }
        aggregator.finish()
    }

    #[test]
    fn continuation_chunks_concatenate() {
        let out = aggregate(&[
            start("call_1", "project_documents", ""),
            TokenFragment::arguments("{\"qu"),
            TokenFragment::arguments("ery\": \"What is "),
            TokenFragment::arguments("HelloAI?\"}"),
        ]);
        assert_eq!(out.calls.len(), 1);
        assert!(out.malformed.is_empty());
        assert_eq!(out.calls[0].id, "call_1");
        assert_eq!(out.calls[0].str_arg("query"), Some("What is HelloAI?"));
    }

    #[test]
    fn calls_keep_start_order() {
        let out = aggregate(&[
            start("b", "generate_diagram", "{\"doc_content\":"),
            TokenFragment::arguments("\"x\"}"),
            start("a", "project_documents", "{\"query\":\"y\"}"),
        ]);
        let ids: Vec<&str> = out.calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn malformed_call_does_not_drop_siblings() {
        let out = aggregate(&[
            start("call_1", "project_documents", "{\"query\": \"ok\"}"),
            start("call_2", "generate_diagram", "{\"doc_content\": \"trunc"),
            start("call_3", "final_answer", "{\"answer\": \"done\"}"),
        ]);
        assert_eq!(out.calls.len(), 2);
        assert_eq!(out.calls[0].id, "call_1");
        assert_eq!(out.calls[1].id, "call_3");
        assert_eq!(out.malformed.len(), 1);
        assert_eq!(out.malformed[0].id, "call_2");
        assert_eq!(out.malformed[0].arguments, "{\"doc_content\": \"trunc");
    }

    #[test]
    fn non_object_arguments_are_malformed() {
        let out = aggregate(&[start("c", "final_answer", "[1, 2]")]);
        assert!(out.calls.is_empty());
        assert!(out.malformed[0].reason.contains("not an object"));
    }

    #[test]
    fn empty_fragments_are_ignored() {
        let out = aggregate(&[
            TokenFragment::default(),
            start("c", "final_answer", "{\"answer\":"),
            TokenFragment::text(""),
            TokenFragment::arguments(""),
            TokenFragment::arguments("\"hi\"}"),
        ]);
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.calls[0].str_arg("answer"), Some("hi"));
    }

    #[test]
    fn missing_arguments_mean_empty_object() {
        let out = aggregate(&[start("c", "final_answer", "")]);
        assert_eq!(out.calls.len(), 1);
        assert!(out.calls[0].arguments.is_empty());
    }

    #[test]
    fn empty_id_is_a_continuation() {
        let out = aggregate(&[
            start("c", "final_answer", "{\"answer\""),
            TokenFragment::tool_call(Some(String::new()), None, ": \"x\"}"),
        ]);
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.calls[0].str_arg("answer"), Some("x"));
    }

    #[test]
    fn orphan_chunks_and_nameless_calls_are_dropped() {
        let out = aggregate(&[
            TokenFragment::arguments("{\"lost\": true}"),
            TokenFragment::tool_call(Some("n".into()), None, "{}"),
        ]);
        assert!(out.calls.is_empty());
        assert_eq!(out.malformed.len(), 1);
        assert_eq!(out.malformed[0].reason, "missing tool name");
    }

    #[test]
    fn duplicate_ids_keep_the_first() {
        let out = aggregate(&[
            start("dup", "project_documents", "{\"query\": \"a\"}"),
            start("dup", "project_documents", "{\"query\": \"b\"}"),
        ]);
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.calls[0].str_arg("query"), Some("a"));
        assert_eq!(out.malformed[0].reason, "duplicate call id");
    }

    #[test]
    fn text_is_collected_separately() {
        let out = aggregate(&[
            TokenFragment::text("Let me "),
            TokenFragment::text("check."),
            start("c", "final_answer", "{}"),
        ]);
        assert_eq!(out.text, "Let me check.");
        assert_eq!(out.calls.len(), 1);
    }
}

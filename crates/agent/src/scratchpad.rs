//! Per-turn log of tool calls and their observations.

use std::collections::HashMap;

use kbchat_core::error::ToolError;
use kbchat_core::message::Message;
use kbchat_core::tool::{ToolCall, ToolObservation};

#[derive(Debug, Clone)]
pub struct ScratchpadEntry {
    pub call: ToolCall,
    pub observation: ToolObservation,
}

/// Entries grouped by the cycle that produced them.
///
/// Lives for one turn only; nothing here is written to chat history.
#[derive(Debug, Default)]
pub struct Scratchpad {
    steps: Vec<Vec<ScratchpadEntry>>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one cycle, pairing each call with its observation in call order.
    ///
    /// A call without an observation is recorded as failed.
    pub fn record(&mut self, calls: Vec<ToolCall>, mut observations: HashMap<String, ToolObservation>) {
        let step = calls
            .into_iter()
            .map(|call| {
                let observation = observations.remove(&call.id).unwrap_or_else(|| {
                    ToolObservation::failure(
                        &call.id,
                        &ToolError::ExecutionFailed {
                            tool_name: call.name.clone(),
                            reason: "no result was produced".into(),
                        },
                    )
                });
                ScratchpadEntry { call, observation }
            })
            .collect();
        self.steps.push(step);
    }

    pub fn entries(&self) -> impl Iterator<Item = &ScratchpadEntry> {
        self.steps.iter().flatten()
    }

    /// The entries of the most recent cycle.
    pub fn last_step(&self) -> &[ScratchpadEntry] {
        self.steps.last().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn steps(&self) -> usize {
        self.steps.len()
    }

    pub fn len(&self) -> usize {
        self.steps.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replay as chat messages: per cycle, the assistant tool-call message
    /// followed by one tool result per call.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.len() + self.steps.len());
        for step in self.steps.iter().filter(|s| !s.is_empty()) {
            let calls = step.iter().map(|e| e.call.clone()).collect();
            messages.push(Message::assistant_tool_calls("", calls));
            for entry in step {
                messages.push(Message::tool_result(
                    &entry.call.id,
                    &entry.observation.content,
                ));
            }
        }
        messages
    }
}

//! Text framing of agent events for the `/invoke` stream.
//!
//! ```text
//! <step><step_name>project_documents</step_name>{"query": "..."}</step>
//! <step><step_name>final_answer</step_name>{"answer": "...", "tools_used": [...]}
//! ```
//!
//! The last step is not closed: the stream simply ends after `Done`.

use kbchat_core::stream::StreamEvent;

#[derive(Debug, Default)]
pub struct StepFramer {
    steps: usize,
}

impl StepFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The text to send for `event`, if any.
    pub fn frame(&mut self, event: &StreamEvent) -> Option<String> {
        match event {
            StreamEvent::Token(fragment) => {
                let mut out = String::new();
                if let Some(name) = fragment.name.as_deref().filter(|n| !n.is_empty()) {
                    self.steps += 1;
                    out.push_str("<step><step_name>");
                    out.push_str(name);
                    out.push_str("</step_name>");
                }
                out.push_str(&fragment.arguments);
                (!out.is_empty()).then_some(out)
            }
            StreamEvent::StepEnd => Some("</step>".to_string()),
            StreamEvent::Done => None,
        }
    }

    /// Step headers written so far.
    pub fn steps(&self) -> usize {
        self.steps
    }
}

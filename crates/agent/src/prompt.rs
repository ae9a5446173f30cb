//! Prompt assembly: system prompt, chat history, user input, scratchpad.

use kbchat_core::message::{ChatHistory, Message};

use crate::scratchpad::Scratchpad;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant for an expert in Cloud, Data Engineering, Web Applications and Mobile Applications.
When answering questions you have these tools:
1. project_documents: search the project documents.
2. generate_diagram: draw a system diagram in Mermaid syntax from documentation.
3. final_answer: give the final answer to the user.

Always look up project information with project_documents before answering.
When you have enough information, call final_answer with the complete answer, \
keeping any source links the tools returned, and list the tools you used in tools_used.";

/// Messages for one model request, in the order the model sees them.
pub fn build_messages(
    system_prompt: &str,
    history: &ChatHistory,
    input: &str,
    scratchpad: &Scratchpad,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.messages.len() + scratchpad.len() * 2 + 2);
    messages.push(Message::system(system_prompt));
    messages.extend(history.messages.iter().cloned());
    messages.push(Message::user(input));
    messages.extend(scratchpad.to_messages());
    messages
}

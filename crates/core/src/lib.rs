//! # kbchat core
//!
//! Domain types, traits, and error definitions for the kbchat knowledge-base
//! agent. This crate has **no framework dependencies**: it defines the model
//! that the provider, retrieval, tool, and agent crates implement against.
//!
//! ## Layout
//!
//! - [`message`] — conversation turns and the cross-turn chat history
//! - [`tool`] — the `Tool` trait, tool calls, observations, and the registry
//! - [`provider`] — the language-model collaborator
//! - [`stream`] — token fragments and queue sentinels
//! - [`retrieval`] — the document retrieval collaborator
//! - [`agent`] — terminal answer payload and turn outcomes
//! - [`event`] — in-process domain event bus

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod stream;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{FinalAnswer, TurnOutcome, NO_ANSWER_PLACEHOLDER};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{ChatHistory, ConversationId, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolChoice, ToolDefinition};
pub use retrieval::{KnowledgeBase, QaAnswer, RetrievedDocument, Retriever, UNKNOWN_ANSWER};
pub use stream::{StreamEvent, TokenFragment};
pub use tool::{Tool, ToolCall, ToolObservation, ToolOutput, ToolRegistry};

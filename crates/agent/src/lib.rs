//! The agent execution engine: the core of kbchat.
//!
//! One user turn runs as a bounded loop of **cycles**:
//!
//! 1. **Prompt** the model with system prompt, chat history, input and
//!    the turn's scratchpad, forcing at least one tool call
//! 2. **Stream** the response; every fragment goes to the event queue and
//!    the aggregator rebuilds complete tool calls
//! 3. **Execute** the calls concurrently and record the observations
//! 4. **Stop** when the terminal tool was called, otherwise loop until the
//!    iteration limit is reached
//!
//! Only the user input and the final answer text outlive the turn.

pub mod aggregator;
pub mod bootstrap;
pub mod executor;
pub mod loop_runner;
pub mod prompt;
pub mod queue;
pub mod scratchpad;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use aggregator::{AggregatedResponse, MalformedToolCall, ToolCallAggregator};
pub use bootstrap::{build_agent, build_agent_with};
pub use executor::ToolExecutor;
pub use loop_runner::{AgentExecutor, TurnResult};
pub use queue::{EventReceiver, EventSender, event_queue};
pub use scratchpad::{Scratchpad, ScratchpadEntry};
pub use tokio_util::sync::CancellationToken;

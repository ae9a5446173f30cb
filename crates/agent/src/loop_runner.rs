//! The agent reasoning loop implementation.

use std::sync::Arc;
use std::time::Duration;

use kbchat_config::AppConfig;
use kbchat_core::agent::{FinalAnswer, NO_ANSWER_PLACEHOLDER, TurnOutcome};
use kbchat_core::error::ProviderError;
use kbchat_core::event::{DomainEvent, EventBus};
use kbchat_core::message::ChatHistory;
use kbchat_core::provider::{Provider, ProviderRequest, ToolChoice};
use kbchat_core::tool::ToolRegistry;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregator::{AggregatedResponse, ToolCallAggregator};
use crate::executor::ToolExecutor;
use crate::prompt::{self, DEFAULT_SYSTEM_PROMPT};
use crate::queue::{EventReceiver, EventSender, event_queue};
use crate::scratchpad::{Scratchpad, ScratchpadEntry};

/// How a turn went.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnResult {
    pub outcome: TurnOutcome,
    pub answer: FinalAnswer,
    /// Model cycles used
    pub iterations: usize,
}

enum Cycle {
    Completed(AggregatedResponse),
    Failed(ProviderError),
    Cancelled,
}

/// Drives the model through bounded tool-calling cycles until the terminal
/// tool is called.
///
/// Holds the conversation's chat history; turns on one executor run one
/// after another.
pub struct AgentExecutor {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    executor: ToolExecutor,
    terminal_tool: String,
    max_iterations: usize,
    system_prompt: String,
    history: Arc<Mutex<ChatHistory>>,
    event_bus: Arc<EventBus>,
}

impl AgentExecutor {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            executor: ToolExecutor::new(tools, Duration::from_secs(120), event_bus.clone()),
            terminal_tool: "final_answer".into(),
            max_iterations: 3,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            history: Arc::new(Mutex::new(ChatHistory::new())),
            event_bus,
        }
    }

    /// Apply the `llm` and `agent` configuration sections.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let mut agent = Self::new(provider, config.llm.model.clone(), tools, event_bus)
            .with_temperature(config.llm.temperature)
            .with_max_iterations(config.agent.max_iterations)
            .with_terminal_tool(config.agent.terminal_tool.clone())
            .with_tool_timeout(Duration::from_secs(config.agent.tool_timeout_secs));
        agent.max_tokens = config.llm.max_tokens;
        if let Some(prompt) = &config.agent.system_prompt {
            agent.system_prompt = prompt.clone();
        }
        agent
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_terminal_tool(mut self, name: impl Into<String>) -> Self {
        self.terminal_tool = name.into();
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.executor = self.executor.with_timeout(timeout);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_history(mut self, history: ChatHistory) -> Self {
        self.history = Arc::new(Mutex::new(history));
        self
    }

    /// Use another executor's history. Turns on either executor then run one
    /// at a time and record into the same history.
    pub fn with_shared_history(mut self, history: Arc<Mutex<ChatHistory>>) -> Self {
        self.history = history;
        self
    }

    pub fn shared_history(&self) -> Arc<Mutex<ChatHistory>> {
        Arc::clone(&self.history)
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Snapshot of the chat history. Waits for a running turn to finish.
    pub async fn history(&self) -> ChatHistory {
        self.history.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    /// Run one user turn.
    ///
    /// Every fragment the model streams is forwarded to `events`. A cycle
    /// without the terminal tool ends with `StepEnd`; the cycle that calls it
    /// ends with `Done`. An exhausted or cancelled turn pushes no `Done`.
    /// The user input and the answer text are appended to chat history
    /// whatever the outcome.
    pub async fn invoke(
        &self,
        input: &str,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> TurnResult {
        let mut history = self.history.lock().await;
        info!(
            conversation_id = %history.id,
            history_turns = history.turns(),
            "Processing turn"
        );

        let definitions = self.executor.tools().definitions();
        let mut scratchpad = Scratchpad::new();
        let mut iterations = 0;
        let mut outcome = TurnOutcome::Exhausted;
        let mut answer = None;

        while iterations < self.max_iterations {
            if cancel.is_cancelled() {
                outcome = TurnOutcome::Cancelled;
                break;
            }

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: prompt::build_messages(&self.system_prompt, &history, input, &scratchpad),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: definitions.clone(),
                tool_choice: ToolChoice::Any,
                stream: true,
            };

            let cycle = self.run_cycle(request, events, cancel).await;
            iterations += 1;

            let response = match cycle {
                Cycle::Completed(response) => response,
                Cycle::Cancelled => {
                    outcome = TurnOutcome::Cancelled;
                    break;
                }
                Cycle::Failed(e) => {
                    warn!(iteration = iterations, error = %e, "Model call failed");
                    self.event_bus.error("agent.cycle", e.to_string());
                    events.step_end();
                    continue;
                }
            };

            debug!(
                iteration = iterations,
                calls = response.calls.len(),
                malformed = response.malformed.len(),
                "Model response aggregated"
            );

            let observations = self.executor.execute_batch(&response.calls).await;
            let terminal = response
                .calls
                .iter()
                .position(|call| call.name == self.terminal_tool);
            scratchpad.record(response.calls, observations);

            if let Some(index) = terminal {
                answer = Some(extract_answer(&scratchpad.last_step()[index]));
                outcome = TurnOutcome::Terminated;
                events.done();
                break;
            }
            events.step_end();
        }

        if outcome == TurnOutcome::Exhausted {
            warn!(iterations, "Max iterations reached without a final answer");
        }

        let answer = answer.unwrap_or_else(FinalAnswer::placeholder);
        history.push_turn(input, answer.answer.clone());

        self.event_bus.publish(DomainEvent::TurnCompleted {
            conversation_id: history.id.to_string(),
            iterations,
            outcome,
            timestamp: chrono::Utc::now(),
        });
        info!(
            conversation_id = %history.id,
            %outcome,
            iterations,
            tool_calls = scratchpad.len(),
            "Turn finished"
        );

        TurnResult {
            outcome,
            answer,
            iterations,
        }
    }

    /// Run a turn on a background task.
    ///
    /// The receiver ends when the turn is done. The task keeps running if the
    /// receiver is dropped; cancel `cancel` to stop it.
    pub fn spawn_turn(
        self: &Arc<Self>,
        input: impl Into<String>,
        cancel: CancellationToken,
    ) -> (EventReceiver, JoinHandle<TurnResult>) {
        let (tx, rx) = event_queue();
        let agent = Arc::clone(self);
        let input = input.into();
        let handle = tokio::spawn(async move { agent.invoke(&input, &tx, &cancel).await });
        (rx, handle)
    }

    async fn run_cycle(
        &self,
        request: ProviderRequest,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Cycle {
        let mut stream = tokio::select! {
            _ = cancel.cancelled() => return Cycle::Cancelled,
            result = self.provider.stream(request) => match result {
                Ok(stream) => stream,
                Err(e) => return Cycle::Failed(e),
            },
        };

        let mut aggregator = ToolCallAggregator::new();
        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => return Cycle::Cancelled,
                item = stream.recv() => item,
            };
            match item {
                Some(Ok(fragment)) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    aggregator.push(&fragment);
                    events.token(fragment);
                }
                Some(Err(e)) => return Cycle::Failed(e),
                None => break,
            }
        }
        Cycle::Completed(aggregator.finish())
    }
}

/// The answer carried by a terminal tool call.
///
/// The observation's structured data wins. Without it the call's own
/// `answer` argument is used with no tools listed.
fn extract_answer(entry: &ScratchpadEntry) -> FinalAnswer {
    let structured = entry
        .observation
        .data
        .clone()
        .filter(|_| entry.observation.success)
        .and_then(|data| serde_json::from_value::<FinalAnswer>(data).ok());

    structured.unwrap_or_else(|| {
        warn!(
            call_id = %entry.call.id,
            "Terminal tool returned no structured answer, using its arguments"
        );
        let provisional = entry.call.str_arg("answer").unwrap_or(NO_ANSWER_PLACEHOLDER);
        FinalAnswer::new(provisional, Vec::new())
    })
}

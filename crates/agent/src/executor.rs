//! Concurrent execution of one cycle's tool calls.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::join_all;
use kbchat_core::error::ToolError;
use kbchat_core::event::{DomainEvent, EventBus};
use kbchat_core::tool::{ToolCall, ToolObservation, ToolRegistry};
use tracing::{debug, warn};

pub struct ToolExecutor {
    tools: Arc<ToolRegistry>,
    timeout: Duration,
    event_bus: Arc<EventBus>,
}

impl ToolExecutor {
    pub fn new(tools: Arc<ToolRegistry>, timeout: Duration, event_bus: Arc<EventBus>) -> Self {
        Self {
            tools,
            timeout,
            event_bus,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run every call at once and wait for all of them.
    ///
    /// The map holds exactly one observation per call id. Failures, unknown
    /// tools and timeouts included, become error observations.
    pub async fn execute_batch(&self, calls: &[ToolCall]) -> HashMap<String, ToolObservation> {
        debug!(count = calls.len(), "Executing tool calls");
        join_all(calls.iter().map(|call| self.execute_one(call)))
            .await
            .into_iter()
            .map(|obs| (obs.tool_call_id.clone(), obs))
            .collect()
    }

    async fn execute_one(&self, call: &ToolCall) -> ToolObservation {
        let start = Instant::now();
        let run = AssertUnwindSafe(self.tools.execute(call)).catch_unwind();
        let result = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(ToolError::ExecutionFailed {
                tool_name: call.name.clone(),
                reason: format!("tool panicked: {}", panic_message(panic.as_ref())),
            }),
            Err(_) => Err(ToolError::Timeout {
                tool_name: call.name.clone(),
                timeout_secs: self.timeout.as_secs(),
            }),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let observation = match result {
            Ok(output) => {
                debug!(tool = %call.name, duration_ms, "Tool finished");
                ToolObservation::success(&call.id, output)
            }
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool execution failed");
                ToolObservation::failure(&call.id, &e)
            }
        };

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: observation.success,
            duration_ms,
            timestamp: chrono::Utc::now(),
        });
        observation
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

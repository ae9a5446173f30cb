//! `POST /invoke`: one agent turn streamed back as framed text.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Form,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::Response,
};
use futures::Stream;
use kbchat_agent::{CancellationToken, EventReceiver};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::framing::StepFramer;
use crate::{ApiError, SharedState};

#[derive(Debug, Deserialize)]
pub struct InvokeForm {
    pub content: String,
}

/// Cancels the turn when the response body is dropped early, if armed.
struct DisconnectGuard {
    cancel: Option<CancellationToken>,
}

impl DisconnectGuard {
    fn disarm(&mut self) {
        self.cancel = None;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            debug!("Invoke stream dropped before the turn ended, cancelling");
            cancel.cancel();
        }
    }
}

struct FrameState {
    events: EventReceiver,
    framer: StepFramer,
    idle: Duration,
    guard: DisconnectGuard,
}

/// Frame queue events until the turn ends or nothing arrives for `idle`.
fn framed_stream(
    events: EventReceiver,
    idle: Duration,
    cancel_on_drop: Option<CancellationToken>,
) -> impl Stream<Item = Result<String, Infallible>> + Send {
    let state = FrameState {
        events,
        framer: StepFramer::new(),
        idle,
        guard: DisconnectGuard {
            cancel: cancel_on_drop,
        },
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            match tokio::time::timeout(state.idle, state.events.next()).await {
                Ok(Some(event)) => {
                    if let Some(chunk) = state.framer.frame(&event) {
                        return Some((Ok(chunk), state));
                    }
                }
                Ok(None) => {
                    state.guard.disarm();
                    debug!(
                        steps = state.framer.steps(),
                        done = state.events.saw_done(),
                        "Invoke stream finished"
                    );
                    return None;
                }
                Err(_) => {
                    warn!(idle_secs = state.idle.as_secs(), "Invoke stream idle, closing");
                    return None;
                }
            }
        }
    })
}

pub async fn invoke_handler(
    State(state): State<SharedState>,
    Form(form): Form<InvokeForm>,
) -> Result<Response, ApiError> {
    let agent = state.agent().await.ok_or_else(|| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Agent is not configured; set the model API key in /admin/settings",
        )
    })?;
    let (idle, cancel_on_disconnect) = {
        let config = state.config.read().await;
        (
            Duration::from_secs(config.gateway.stream_idle_timeout_secs),
            config.gateway.cancel_on_disconnect,
        )
    };

    info!(content_len = form.content.len(), "Invoke request");
    let cancel = CancellationToken::new();
    let (events, _turn) = agent.spawn_turn(form.content, cancel.clone());
    let body = framed_stream(events, idle, cancel_on_disconnect.then_some(cancel));

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body))
        .map_err(|e| ApiError::internal(e.to_string()))
}

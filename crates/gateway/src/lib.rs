//! HTTP gateway for kbchat.
//!
//! - `POST /invoke`          — run an agent turn, stream framed tool calls
//! - `GET  /health`          — liveness
//! - `GET  /admin/settings`  — current settings, secrets redacted
//! - `POST /admin/settings`  — partial settings update, persisted to disk
//! - `GET  /download`        — fetch a file from the public data directory
//! - `GET  /download/list`   — list downloadable files
//!
//! Built on Axum.

pub mod admin;
pub mod files;
pub mod framing;
pub mod invoke;

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    routing::post,
};
use kbchat_agent::AgentExecutor;
use kbchat_config::AppConfig;
use kbchat_core::event::{DomainEvent, EventBus};
use tokio::sync::broadcast::error::RecvError;
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

/// Builds an agent from configuration. Called at startup and after every
/// settings update.
pub type AgentFactory =
    Arc<dyn Fn(&AppConfig, Arc<EventBus>) -> kbchat_core::Result<AgentExecutor> + Send + Sync>;

/// Shared application state for the gateway.
pub struct ApiState {
    pub config: RwLock<AppConfig>,
    pub event_bus: Arc<EventBus>,
    agent: RwLock<Option<Arc<AgentExecutor>>>,
    factory: AgentFactory,
}

pub type SharedState = Arc<ApiState>;

impl ApiState {
    /// Build the state and the first agent. A configuration that cannot
    /// produce an agent (no API key yet) still serves the other routes.
    pub fn new(config: AppConfig, factory: AgentFactory) -> Self {
        let event_bus = Arc::new(EventBus::default());
        let agent = match factory(&config, event_bus.clone()) {
            Ok(agent) => Some(Arc::new(agent)),
            Err(e) => {
                warn!(error = %e, "Agent not available until settings are fixed");
                None
            }
        };
        Self {
            config: RwLock::new(config),
            event_bus,
            agent: RwLock::new(agent),
            factory,
        }
    }

    /// State wired to the configured OpenAI-compatible providers.
    pub fn from_config(config: AppConfig) -> Self {
        Self::new(config, Arc::new(kbchat_agent::build_agent))
    }

    pub async fn agent(&self) -> Option<Arc<AgentExecutor>> {
        self.agent.read().await.clone()
    }

    /// Replace the agent after a configuration change, keeping chat history.
    ///
    /// The new agent shares the old one's history, so a turn still running
    /// on the old agent records into the history the new agent reads.
    pub async fn rebuild_agent(&self, config: &AppConfig) {
        let mut current = self.agent.write().await;
        let history = current.as_ref().map(|agent| agent.shared_history());
        *current = match (self.factory)(config, self.event_bus.clone()) {
            Ok(agent) => {
                let agent = match history {
                    Some(history) => agent.with_shared_history(history),
                    None => agent,
                };
                info!("Agent rebuilt with updated settings");
                Some(Arc::new(agent))
            }
            Err(e) => {
                warn!(error = %e, "Agent could not be rebuilt");
                None
            }
        };
    }
}

/// Error body, in the `{"detail": ...}` shape clients expect.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// An error response: status plus detail message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let origins: Vec<HeaderValue> = config
        .gateway
        .allowed_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, config: &AppConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/invoke", post(invoke::invoke_handler))
        .route(
            "/admin/settings",
            get(admin::get_settings_handler).post(admin::update_settings_handler),
        )
        .route("/download", get(files::download_handler))
        .route("/download/list", get(files::list_handler))
        .layer(cors_layer(config))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Log domain events from `bus` at debug level until the bus is dropped.
pub fn spawn_event_log(bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::ToolExecuted {
            tool_name,
            success,
            duration_ms,
            ..
        } => debug!(tool = %tool_name, success, duration_ms, "Tool executed"),
        DomainEvent::TurnCompleted {
            conversation_id,
            iterations,
            outcome,
            ..
        } => debug!(conversation_id = %conversation_id, iterations, outcome = %outcome, "Turn completed"),
        DomainEvent::ErrorOccurred {
            context,
            error_message,
            ..
        } => debug!(context = %context, error = %error_message, "Agent error reported"),
    }
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = Arc::new(ApiState::from_config(config.clone()));
    spawn_event_log(&state.event_bus);
    let router = build_router(state, &config);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "chatbot-api",
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use kbchat_core::error::ProviderError;
    use kbchat_core::message::Message;
    use kbchat_core::provider::{FragmentStream, Provider, ProviderRequest, ProviderResponse};
    use kbchat_core::stream::TokenFragment;
    use kbchat_core::tool::ToolRegistry;
    use std::sync::Mutex;

    /// Scripted cycles shared by every agent built from it.
    pub struct ScriptedStream {
        cycles: Mutex<Vec<Vec<TokenFragment>>>,
    }

    impl ScriptedStream {
        pub fn new(cycles: Vec<Vec<TokenFragment>>) -> Self {
            Self {
                cycles: Mutex::new(cycles),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedStream {
        fn name(&self) -> &str {
            "gateway_mock"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant("unused"),
                usage: None,
                model: request.model,
            })
        }

        async fn stream(&self, _request: ProviderRequest) -> Result<FragmentStream, ProviderError> {
            let fragments = {
                let mut cycles = self.cycles.lock().unwrap();
                if cycles.is_empty() {
                    return Err(ProviderError::ApiError {
                        status_code: 500,
                        message: "script exhausted".into(),
                    });
                }
                cycles.remove(0)
            };
            let (tx, rx) = tokio::sync::mpsc::channel(fragments.len().max(1));
            for fragment in fragments {
                let _ = tx.try_send(Ok(fragment));
            }
            Ok(rx)
        }
    }

    pub fn state_with(config: AppConfig, provider: Arc<ScriptedStream>) -> SharedState {
        let factory: AgentFactory = Arc::new(
            move |config: &AppConfig, bus: Arc<EventBus>| -> kbchat_core::Result<AgentExecutor> {
            let mut tools = ToolRegistry::new();
            tools.register(Box::new(kbchat_tools::FinalAnswerTool));
            Ok(AgentExecutor::from_config(
                config,
                provider.clone(),
                Arc::new(tools),
                bus,
            ))
        });
        Arc::new(ApiState::new(config, factory))
    }

    /// Config persisted into `dir`, with `public` as the download root.
    pub fn config_in(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::load_from(&dir.join("config.toml")).unwrap();
        config.data.public_dir = dir.join("public");
        config
    }
}

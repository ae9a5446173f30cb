//! Settings administration.

use axum::{Json, extract::State};
use kbchat_config::{SettingsUpdate, SettingsView};
use serde::Serialize;
use tracing::{info, warn};

use crate::{ApiError, SharedState};

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: &'static str,
}

pub async fn get_settings_handler(State(state): State<SharedState>) -> Json<SettingsView> {
    Json(state.config.read().await.settings_view())
}

/// Apply a partial update, persist it, then rebuild the agent.
pub async fn update_settings_handler(
    State(state): State<SharedState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<StatusResponse>, ApiError> {
    let next = {
        let mut config = state.config.write().await;
        let mut next = config.clone();
        next.apply_update(update)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        let path = next.persist().map_err(|e| {
            warn!(error = %e, "Settings could not be saved");
            ApiError::internal(format!("Error updating settings: {e}"))
        })?;
        info!(path = %path.display(), "Settings saved");
        *config = next.clone();
        next
    };

    state.rebuild_agent(&next).await;
    Ok(Json(StatusResponse {
        status: "success",
        message: "Settings updated successfully",
    }))
}

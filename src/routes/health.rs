use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub api_key_configured: bool,
    pub timestamp: DateTime<Utc>,
}

/// GET /health — always 200; reports whether the upstream credential loaded.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        api_key_configured: state.upstream.is_configured(),
        timestamp: Utc::now(),
    })
}

use axum::{Json, extract::State};
use std::sync::Arc;
use crate::models::HealthResponse;
use crate::state::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        tracked_clients: state.gate.limiter().store().len(),
    })
}

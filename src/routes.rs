use axum::{Router, middleware, routing::get};
use std::sync::Arc;
use crate::gatekeeper::gatekeeper_middleware;
use crate::handlers::{health_handler, metrics_handler, proxy_handler};
use crate::state::AppState;

// Ops endpoints answer directly; everything else goes through the gate to the upstream
pub fn router(state: Arc<AppState>) -> Router {
    let gated = Router::new()
        .fallback(proxy_handler)
        .layer(middleware::from_fn_with_state(
            state.gate.clone(),
            gatekeeper_middleware,
        ))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .merge(gated)
}

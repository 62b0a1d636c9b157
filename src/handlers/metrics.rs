use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

pub async fn metrics_handler() -> Response {
    match crate::metrics::render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

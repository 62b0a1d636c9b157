use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use thiserror::Error;

// Startup-time configuration problems
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid user-agent deny pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rate limit must allow at least one request per window")]
    ZeroLimit,

    #[error("{name} must be between 1 second and {max_secs} seconds, got {secs}")]
    DurationOutOfRange {
        name: &'static str,
        secs: u64,
        max_secs: u64,
    },

    #[error("invalid upstream url `{0}`")]
    InvalidUpstream(String),
}

// Failures on the forwarding hop to the upstream application
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[source] reqwest::Error),

    #[error("failed to read upstream body: {0}")]
    UpstreamBody(#[source] reqwest::Error),
}

impl ProxyError {
    // Tells a body over the buffering limit apart from a broken stream
    pub fn from_body_error(err: axum::Error, limit: usize) -> Self {
        let inner = err.into_inner();
        if inner.is::<LengthLimitError>() {
            ProxyError::PayloadTooLarge { limit }
        } else {
            ProxyError::RequestBody(axum::Error::new(inner))
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::RequestBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) | ProxyError::UpstreamBody(_) => StatusCode::BAD_GATEWAY,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, http_status = %status, "Proxy error");
        } else {
            tracing::warn!(error = %self, http_status = %status, "Proxy error");
        }

        let body = status.canonical_reason().unwrap_or("Error");
        (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
    }
}

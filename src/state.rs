use std::sync::Arc;
use std::time::Duration;
use crate::gatekeeper::Gatekeeper;

// app's shared state
pub struct AppState {
    pub client: reqwest::Client,
    pub upstream: String, // base url of the protected application
    pub gate: Arc<Gatekeeper>,
}

impl AppState {
    pub fn new(upstream: String, gate: Arc<Gatekeeper>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: upstream_client()?,
            upstream,
            gate,
        })
    }
}

// Redirects go back to the browser untouched, never followed here
pub fn upstream_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(30))
        .build()
}

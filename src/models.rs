use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Body of GET /health
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub tracked_clients: usize,
}

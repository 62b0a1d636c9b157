use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, TextEncoder, register_counter, register_gauge};


lazy_static! {
    pub static ref GATED_REQUESTS: Counter =
        register_counter!("gatekeeper_requests_total", "Requests evaluated by the gate").unwrap();
    pub static ref AGENT_REJECTIONS: Counter =
        register_counter!("gatekeeper_agent_rejections_total", "Requests rejected for their User-Agent").unwrap();
    pub static ref RATE_LIMIT_REJECTIONS: Counter =
        register_counter!("gatekeeper_rate_limited_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref CLIENTS_BLOCKED: Counter =
        register_counter!("gatekeeper_clients_blocked_total", "Clients moved into the blocked state").unwrap();
    pub static ref STORE_EVICTIONS: Counter =
        register_counter!("gatekeeper_store_evictions_total", "Stale entries removed by cleanup sweeps").unwrap();
    pub static ref TRACKED_CLIENTS: Gauge =
        register_gauge!("gatekeeper_tracked_clients", "Client keys currently held in the rate limit store").unwrap();
}

// Registers every gate metric so they show up before first use
pub fn register() {
    lazy_static::initialize(&GATED_REQUESTS);
    lazy_static::initialize(&AGENT_REJECTIONS);
    lazy_static::initialize(&RATE_LIMIT_REJECTIONS);
    lazy_static::initialize(&CLIENTS_BLOCKED);
    lazy_static::initialize(&STORE_EVICTIONS);
    lazy_static::initialize(&TRACKED_CLIENTS);
}

// Text exposition of everything in the default registry
pub fn render() -> Result<String, prometheus::Error> {
    register();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_gate_metrics() {
        GATED_REQUESTS.inc();
        TRACKED_CLIENTS.set(3.0);
        let text = render().unwrap();
        assert!(text.contains("gatekeeper_requests_total"));
        assert!(text.contains("# TYPE gatekeeper_tracked_clients gauge"));
    }
}

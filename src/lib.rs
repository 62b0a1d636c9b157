//! Abuse filter that sits in front of a web application: rejects known
//! automation User-Agents and rate limits each client with a fixed window,
//! blocking clients that overflow it for a while.

pub mod agent;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod gatekeeper;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod store;
pub mod sweeper;

pub use gatekeeper::{Gatekeeper, Verdict, gatekeeper_middleware};
pub use rate_limit::{Decision, RateLimitEntry, RateLimiter};
pub use store::{InMemoryStore, RateLimitStore};

use chrono::TimeDelta;
use clap::Parser;
use crate::agent::{DEFAULT_MISSING_AGENT_POLICY, MissingAgentPolicy};
use crate::error::ConfigError;

// Longest window/block/sweep interval we accept (one week)
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

pub const DEFAULT_RATE_LIMIT: u32 = 30;
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;
pub const DEFAULT_BLOCK_SECS: u64 = 300;
pub const DEFAULT_CLEANUP_SECS: u64 = 300;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "gatekeeper")]
#[command(about = "Rate limiting and bot filtering gateway for an upstream web app")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Application server that allowed requests are forwarded to
    #[arg(short, long, default_value = "http://localhost:3000")]
    pub upstream: String,

    // Max requests per client per window
    #[arg(long, default_value_t = DEFAULT_RATE_LIMIT)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = DEFAULT_RATE_WINDOW_SECS)]
    pub rate_window: u64,

    // How long a client stays blocked after exceeding the limit, in seconds
    #[arg(long, default_value_t = DEFAULT_BLOCK_SECS)]
    pub block_duration: u64,

    // Minimum seconds between stale-entry sweeps
    #[arg(long, default_value_t = DEFAULT_CLEANUP_SECS)]
    pub cleanup_interval: u64,

    // Extra User-Agent regexes to reject (repeatable)
    #[arg(long = "deny-agent")]
    pub deny_agents: Vec<String>,

    // Extra path prefixes that skip the gate entirely (repeatable)
    #[arg(long = "bypass-prefix")]
    pub bypass_prefixes: Vec<String>,

    // Reject requests that send no User-Agent
    #[arg(long)]
    pub fail_closed_agent: bool,

    // Ignore X-Forwarded-For / X-Real-IP and key on the peer address only
    #[arg(long)]
    pub no_trust_forwarded: bool,
}

impl Args {
    pub fn rate_limit_config(&self) -> Result<RateLimitConfig, ConfigError> {
        RateLimitConfig::from_secs(
            self.rate_limit,
            self.rate_window,
            self.block_duration,
            self.cleanup_interval,
        )
    }

    pub fn missing_agent_policy(&self) -> MissingAgentPolicy {
        if self.fail_closed_agent {
            MissingAgentPolicy::FailClosed
        } else {
            DEFAULT_MISSING_AGENT_POLICY
        }
    }

    pub fn upstream_url(&self) -> Result<String, ConfigError> {
        let url = self.upstream.trim().trim_end_matches('/');
        // add http:// if not present
        let full = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("http://{}", url)
        };
        let host = full.split_once("://").map(|(_, rest)| rest).unwrap_or_default();
        if host.is_empty() || full.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidUpstream(self.upstream.clone()));
        }
        Ok(full)
    }
}

/// Process-wide limiter settings. Construct through [`RateLimitConfig::from_secs`]
/// so every duration is known to be in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: TimeDelta,
    pub block_duration: TimeDelta,
    pub cleanup_interval: TimeDelta,
}

impl RateLimitConfig {
    pub fn from_secs(
        max_requests: u32,
        window: u64,
        block_duration: u64,
        cleanup_interval: u64,
    ) -> Result<Self, ConfigError> {
        if max_requests == 0 {
            return Err(ConfigError::ZeroLimit);
        }
        Ok(Self {
            max_requests,
            window: bounded("rate window", window)?,
            block_duration: bounded("block duration", block_duration)?,
            cleanup_interval: bounded("cleanup interval", cleanup_interval)?,
        })
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_RATE_LIMIT,
            window: TimeDelta::seconds(DEFAULT_RATE_WINDOW_SECS as i64),
            block_duration: TimeDelta::seconds(DEFAULT_BLOCK_SECS as i64),
            cleanup_interval: TimeDelta::seconds(DEFAULT_CLEANUP_SECS as i64),
        }
    }
}

fn bounded(name: &'static str, secs: u64) -> Result<TimeDelta, ConfigError> {
    if secs == 0 || secs > MAX_DURATION_SECS {
        return Err(ConfigError::DurationOutOfRange {
            name,
            secs,
            max_secs: MAX_DURATION_SECS,
        });
    }
    Ok(TimeDelta::seconds(secs as i64))
}

//! Request gate: static-path bypass, User-Agent filter, then the per-client
//! rate limiter, with the matching HTTP responses.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::SecondsFormat;
use std::net::SocketAddr;
use std::sync::Arc;
use crate::agent::AgentFilter;
use crate::client::ClientKey;
use crate::clock::Clock;
use crate::config::{Args, RateLimitConfig};
use crate::error::ConfigError;
use crate::metrics::{AGENT_REJECTIONS, GATED_REQUESTS, RATE_LIMIT_REJECTIONS};
use crate::rate_limit::{Decision, RateLimiter};
use crate::store::RateLimitStore;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";
pub const HEADER_BLOCKED_REASON: &str = "x-blocked-reason";

pub const AGENT_NOT_ALLOWED: &str = "User-Agent not allowed";
pub const BODY_FORBIDDEN: &str = "Forbidden";
pub const BODY_TOO_MANY: &str = "Too Many Requests";
pub const BODY_BLOCKED: &str = "Too Many Requests - You have been temporarily blocked";

// Paths served straight through: framework internals, static files, icons
#[derive(Debug, Clone)]
pub struct BypassRules {
    prefixes: Vec<String>,
    contains: Vec<String>,
    extensions: Vec<String>,
}

impl Default for BypassRules {
    fn default() -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }
        Self {
            prefixes: owned(&["/_next", "/static"]),
            contains: owned(&["/favicon.ico", "/manifest.json"]),
            extensions: owned(&["svg", "png", "jpg", "jpeg", "gif", "webp", "ico"]),
        }
    }
}

impl BypassRules {
    pub fn with_prefixes(mut self, extra: impl IntoIterator<Item = String>) -> Self {
        self.prefixes.extend(extra);
        self
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return true;
        }
        if self.contains.iter().any(|c| path.contains(c.as_str())) {
            return true;
        }
        let last = path.rsplit('/').next().unwrap_or(path);
        last.rsplit_once('.')
            .is_some_and(|(_, ext)| self.extensions.iter().any(|e| e == ext))
    }
}

/// What the gate decided for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Bypass,
    AgentRejected,
    RateLimited { decision: Decision, retry_after: u64 },
    Allowed(Decision),
}

pub struct Gatekeeper {
    limiter: RateLimiter,
    agents: AgentFilter,
    bypass: BypassRules,
    clock: Arc<dyn Clock>,
    trust_forwarded: bool,
}

impl Gatekeeper {
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            limiter: RateLimiter::new(store, config, clock.now()),
            agents: AgentFilter::default(),
            bypass: BypassRules::default(),
            clock,
            trust_forwarded: true,
        }
    }

    // Everything the CLI controls, validated
    pub fn from_args(
        args: &Args,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let agents = AgentFilter::new(&args.deny_agents, args.missing_agent_policy())?;
        let bypass = BypassRules::default().with_prefixes(args.bypass_prefixes.iter().cloned());
        Ok(Self::new(store, args.rate_limit_config()?, clock)
            .with_agent_filter(agents)
            .with_bypass(bypass)
            .trust_forwarded(!args.no_trust_forwarded))
    }

    pub fn with_agent_filter(mut self, agents: AgentFilter) -> Self {
        self.agents = agents;
        self
    }

    pub fn with_bypass(mut self, bypass: BypassRules) -> Self {
        self.bypass = bypass;
        self
    }

    pub fn trust_forwarded(mut self, trust: bool) -> Self {
        self.trust_forwarded = trust;
        self
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn limit(&self) -> u32 {
        self.limiter.config().max_requests
    }

    pub fn check(&self, path: &str, headers: &HeaderMap, peer: Option<SocketAddr>) -> Verdict {
        if self.bypass.matches(path) {
            return Verdict::Bypass;
        }

        GATED_REQUESTS.inc();
        let key = ClientKey::from_parts(headers, peer, self.trust_forwarded);

        let agent = headers.get(header::USER_AGENT).and_then(|h| h.to_str().ok());
        if self.agents.is_disallowed(agent) {
            AGENT_REJECTIONS.inc();
            tracing::warn!(
                client = %key,
                user_agent = agent.unwrap_or("<missing>"),
                pattern = agent.and_then(|a| self.agents.first_match(a)).unwrap_or("<none>"),
                "Blocked user agent"
            );
            return Verdict::AgentRejected;
        }

        let now = self.clock.now();
        let decision = self.limiter.evaluate(&key, now);
        if decision.allowed {
            return Verdict::Allowed(decision);
        }

        RATE_LIMIT_REJECTIONS.inc();
        let retry_after = decision.retry_after_secs(now);
        tracing::debug!(client = %key, path, retry_after, "Rate limited");
        Verdict::RateLimited {
            decision,
            retry_after,
        }
    }
}

pub async fn gatekeeper_middleware(
    State(gate): State<Arc<Gatekeeper>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    match gate.check(request.uri().path(), request.headers(), peer) {
        Verdict::Bypass => next.run(request).await,
        Verdict::AgentRejected => agent_rejection(),
        Verdict::RateLimited {
            decision,
            retry_after,
        } => rate_limit_rejection(gate.limit(), &decision, retry_after),
        Verdict::Allowed(decision) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(
                response.headers_mut(),
                gate.limit(),
                decision.remaining,
                &decision,
            );
            response
        }
    }
}

pub fn agent_rejection() -> Response {
    (
        StatusCode::FORBIDDEN,
        [
            (header::CONTENT_TYPE, "text/plain"),
            (header::HeaderName::from_static(HEADER_BLOCKED_REASON), AGENT_NOT_ALLOWED),
        ],
        BODY_FORBIDDEN,
    )
        .into_response()
}

pub fn rate_limit_rejection(limit: u32, decision: &Decision, retry_after: u64) -> Response {
    let body = if decision.blocked { BODY_BLOCKED } else { BODY_TOO_MANY };
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::CONTENT_TYPE, "text/plain")],
        body,
    )
        .into_response();

    let headers = response.headers_mut();
    add_rate_limit_headers(headers, limit, 0, decision);
    headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

fn add_rate_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, decision: &Decision) {
    headers.insert(HEADER_LIMIT, HeaderValue::from(limit));
    headers.insert(HEADER_REMAINING, HeaderValue::from(remaining));

    let reset = decision.reset_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    if let Ok(val) = HeaderValue::from_str(&reset) {
        headers.insert(HEADER_RESET, val);
    }
}

use regex::{Regex, RegexBuilder};
use crate::error::ConfigError;

// Known bot, crawler, scraper and HTTP-library signatures, checked in order
pub const DEFAULT_DENY_PATTERNS: &[&str] = &[
    "bot",
    "crawl",
    "spider",
    "scrape",
    "curl",
    "wget",
    "python",
    "java",
    "go-http-client",
    "axios",
];

// What to do with a request that carries no User-Agent at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingAgentPolicy {
    FailOpen,
    FailClosed,
}

pub const DEFAULT_MISSING_AGENT_POLICY: MissingAgentPolicy = MissingAgentPolicy::FailOpen;

pub struct AgentFilter {
    patterns: Vec<Regex>,
    missing: MissingAgentPolicy,
}

impl AgentFilter {
    // Default signatures followed by any extra operator patterns
    pub fn new(extra: &[String], missing: MissingAgentPolicy) -> Result<Self, ConfigError> {
        let patterns = DEFAULT_DENY_PATTERNS
            .iter()
            .copied()
            .chain(extra.iter().map(String::as_str))
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::InvalidPattern {
                        pattern: p.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns, missing })
    }

    // Empty header counts as missing
    pub fn is_disallowed(&self, agent: Option<&str>) -> bool {
        match agent.filter(|a| !a.trim().is_empty()) {
            None => self.missing == MissingAgentPolicy::FailClosed,
            Some(agent) => self.first_match(agent).is_some(),
        }
    }

    // First signature the agent trips, if any
    pub fn first_match(&self, agent: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.is_match(agent))
            .map(|p| p.as_str())
    }
}

impl Default for AgentFilter {
    fn default() -> Self {
        // Built-in patterns are literals and always compile
        let patterns = DEFAULT_DENY_PATTERNS
            .iter()
            .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
            .collect();
        Self {
            patterns,
            missing: DEFAULT_MISSING_AGENT_POLICY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_known_automation_agents() {
        let filter = AgentFilter::default();
        for agent in [
            "Googlebot/2.1 (+http://www.google.com/bot.html)",
            "curl/8.4.0",
            "Wget/1.21.3",
            "python-requests/2.31.0",
            "Java/17.0.2",
            "Go-http-client/1.1",
            "axios/1.6.2",
            "Mozilla/5.0 (compatible; AhrefsSpider)",
            "SiteCRAWLER 3.0",
        ] {
            assert!(filter.is_disallowed(Some(agent)), "{agent} should be blocked");
        }
    }

    #[test]
    fn browsers_pass() {
        let filter = AgentFilter::default();
        let firefox = "Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0";
        let safari = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1";
        assert!(!filter.is_disallowed(Some(firefox)));
        assert!(!filter.is_disallowed(Some(safari)));
    }

    #[test]
    fn first_match_reports_earliest_pattern() {
        let filter = AgentFilter::default();
        // "python" and "bot" both match; "bot" is listed first
        assert_eq!(filter.first_match("python-bot/1.0"), Some("bot"));
        assert_eq!(filter.first_match("Mozilla/5.0"), None);
    }

    #[test]
    fn missing_agent_follows_policy() {
        let open = AgentFilter::new(&[], MissingAgentPolicy::FailOpen).unwrap();
        assert!(!open.is_disallowed(None));
        assert!(!open.is_disallowed(Some("")));

        let closed = AgentFilter::new(&[], MissingAgentPolicy::FailClosed).unwrap();
        assert!(closed.is_disallowed(None));
    }

    #[test]
    fn extra_patterns_are_case_insensitive() {
        let filter = AgentFilter::new(
            &["^headlesschrome".to_string()],
            DEFAULT_MISSING_AGENT_POLICY,
        )
        .unwrap();
        assert!(filter.is_disallowed(Some("HeadlessChrome/119.0")));
        assert!(!filter.is_disallowed(Some("Mozilla/5.0 HeadlessChrome/119.0")));
    }

    #[test]
    fn invalid_extra_pattern_is_a_config_error() {
        let err = AgentFilter::new(&["(unclosed".to_string()], DEFAULT_MISSING_AGENT_POLICY)
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::InvalidPattern { ref pattern, .. } if pattern == "(unclosed"));
    }
}

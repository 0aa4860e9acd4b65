//! Rate limit rules and the limit groups built from them.
//!
//! Rules are loaded from YAML. Each named group (`api`, `disk`, `network`)
//! is a list of rules that becomes one `MultiLimiter`, so a group enforces
//! the most restrictive of its rules while charging every one of them.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::bucket::TokenBucket;
use super::limiter::RateLimiter;
use super::multi::MultiLimiter;
use super::rate::{Rate, TimeWindow};
use crate::error::{LimiterError, Result};

/// A rate limit rule specifying the rate, time window and burst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Number of requests allowed per unit of time (absent means unlimited)
    #[serde(default)]
    pub requests_per_unit: Option<f64>,
    /// The time unit
    #[serde(default = "default_unit")]
    pub unit: TimeWindow,
    /// Maximum number of requests that may proceed back-to-back
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// Optional name/description for this limit
    #[serde(default)]
    pub name: Option<String>,
}

fn default_unit() -> TimeWindow {
    TimeWindow::Second
}

fn default_burst() -> u32 {
    1
}

impl RateLimitRule {
    /// A rule allowing `requests_per_unit` per `unit` with the given burst.
    pub fn new(requests_per_unit: f64, unit: TimeWindow, burst: u32) -> Self {
        Self {
            requests_per_unit: Some(requests_per_unit),
            unit,
            burst,
            name: None,
        }
    }

    /// A rule that never limits.
    pub fn unlimited() -> Self {
        Self {
            requests_per_unit: None,
            unit: default_unit(),
            burst: default_burst(),
            name: None,
        }
    }

    /// The refill rate this rule describes.
    pub fn rate(&self) -> Rate {
        match self.requests_per_unit {
            Some(requests) => Rate::per(requests, self.unit),
            None => Rate::INFINITE,
        }
    }

    /// Build the token bucket enforcing this rule.
    pub fn build(&self) -> Result<TokenBucket> {
        TokenBucket::new(self.rate(), self.burst).map_err(|err| match (&self.name, err) {
            (Some(name), LimiterError::Config(msg)) => {
                LimiterError::Config(format!("rule '{}': {}", name, msg))
            }
            (_, err) => err,
        })
    }
}

/// Limit groups owned by an API connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Limits shared by every endpoint
    #[serde(default = "default_api_rules")]
    pub api: Vec<RateLimitRule>,
    /// Limits for endpoints touching the disk
    #[serde(default = "default_disk_rules")]
    pub disk: Vec<RateLimitRule>,
    /// Limits for endpoints touching the network
    #[serde(default = "default_network_rules")]
    pub network: Vec<RateLimitRule>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            api: default_api_rules(),
            disk: default_disk_rules(),
            network: default_network_rules(),
        }
    }
}

// One request per second with a burst of two, plus an initial pool of ten
// requests refilling once a minute.
fn default_api_rules() -> Vec<RateLimitRule> {
    vec![
        RateLimitRule::new(1.0, TimeWindow::Second, 2),
        RateLimitRule::new(1.0, TimeWindow::Minute, 10),
    ]
}

fn default_disk_rules() -> Vec<RateLimitRule> {
    vec![RateLimitRule::new(1.0, TimeWindow::Second, 1)]
}

fn default_network_rules() -> Vec<RateLimitRule> {
    vec![RateLimitRule::new(1.0, TimeWindow::Second, 3)]
}

impl LimitsConfig {
    /// Load limits from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load limits from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| LimiterError::Config(format!("Failed to parse rate limit config: {}", e)))
    }
}

/// Build the composite limiter for one named group of rules.
pub fn build_group(group: &str, rules: &[RateLimitRule]) -> Result<MultiLimiter> {
    if rules.is_empty() {
        return Err(LimiterError::Config(format!(
            "limit group '{}' has no rules",
            group
        )));
    }

    let members = rules
        .iter()
        .map(|rule| rule.build().map(|bucket| Arc::new(bucket) as Arc<dyn RateLimiter>))
        .collect::<Result<Vec<_>>>()?;

    MultiLimiter::new(members)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_limits() {
        let yaml = r#"
api:
  - requests_per_unit: 2
    unit: second
    burst: 1
  - requests_per_unit: 10
    unit: minute
    burst: 10
    name: per_minute
disk:
  - unit: second
network:
  - requests_per_unit: 3
"#;
        let config = LimitsConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.api.len(), 2);
        assert_eq!(config.api[0].rate(), Rate::per_second(2.0));
        assert_eq!(config.api[1].unit, TimeWindow::Minute);
        assert_eq!(config.api[1].name.as_deref(), Some("per_minute"));

        // Missing rate means unlimited, missing burst defaults to one
        assert_eq!(config.disk[0].rate(), Rate::INFINITE);
        assert_eq!(config.disk[0].burst, 1);
        assert_eq!(config.network[0].unit, TimeWindow::Second);
    }

    #[test]
    fn test_missing_groups_use_defaults() {
        let config = LimitsConfig::from_yaml("disk: []").unwrap();

        assert_eq!(config.api, LimitsConfig::default().api);
        assert!(config.disk.is_empty());
        assert_eq!(config.network, LimitsConfig::default().network);
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        let result = LimitsConfig::from_yaml("api: [ {requests_per_unit: fast} ]");
        assert!(matches!(result, Err(LimiterError::Config(_))));
    }

    #[test]
    fn test_build_group_takes_minimum_rate() {
        let group = build_group("api", &LimitsConfig::default().api).unwrap();

        assert_eq!(group.len(), 2);
        assert_eq!(group.limit(), Rate::per(1.0, TimeWindow::Minute));
    }

    #[test]
    fn test_build_group_rejects_empty() {
        let result = build_group("disk", &[]);
        assert!(matches!(result, Err(LimiterError::Config(msg)) if msg.contains("disk")));
    }

    #[test]
    fn test_zero_burst_rule_names_the_rule() {
        let mut rule = RateLimitRule::new(1.0, TimeWindow::Second, 0);
        rule.name = Some("broken".to_string());

        let result = build_group("api", &[rule]);
        assert!(matches!(result, Err(LimiterError::Config(msg)) if msg.contains("broken")));
    }

    #[test]
    fn test_unlimited_rule() {
        let bucket = RateLimitRule::unlimited().build().unwrap();
        assert!(bucket.limit().is_infinite());
    }
}

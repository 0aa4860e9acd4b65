//! Configuration management for multilimiter.
//!
//! Settings come from an optional YAML file layered under environment
//! variables prefixed with `MULTILIMITER__`, e.g.
//! `MULTILIMITER__DEMO__TIMEOUT_MS=250`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::ratelimit::LimitsConfig;

/// Environment variable prefix and nesting separator.
const ENV_PREFIX: &str = "MULTILIMITER";
const ENV_SEPARATOR: &str = "__";

/// Main configuration for the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Limit groups for the API connection
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Demo workload configuration
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Demo workload configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Concurrent requests issued against each endpoint
    #[serde(default = "default_requests_per_endpoint")]
    pub requests_per_endpoint: usize,

    /// Per-request timeout in milliseconds (none waits indefinitely)
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            requests_per_endpoint: default_requests_per_endpoint(),
            timeout_ms: None,
        }
    }
}

fn default_requests_per_endpoint() -> usize {
    10
}

impl Settings {
    /// Load settings from an optional YAML file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Load settings from a YAML file, without environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| crate::error::LimiterError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LimiterError;
    use crate::ratelimit::{Rate, TimeWindow};
    use std::path::PathBuf;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("multilimiter-{}-{}.yaml", name, std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.demo.requests_per_endpoint, 10);
        assert_eq!(settings.demo.timeout_ms, None);
        assert_eq!(settings.limits.api.len(), 2);
        assert_eq!(settings.limits.disk[0].burst, 1);
        assert_eq!(settings.limits.network[0].burst, 3);
    }

    #[test]
    fn test_from_yaml_partial() {
        let settings = Settings::from_yaml(
            r#"
demo:
  timeout_ms: 250
limits:
  network:
    - requests_per_unit: 5
      unit: minute
      burst: 2
"#,
        )
        .unwrap();

        assert_eq!(settings.demo.timeout_ms, Some(250));
        assert_eq!(settings.demo.requests_per_endpoint, 10);
        assert_eq!(settings.limits.network[0].rate(), Rate::per(5.0, TimeWindow::Minute));
        assert_eq!(settings.limits.api, LimitsConfig::default().api);
    }

    #[test]
    fn test_load_from_file() {
        let path = write_temp(
            "load",
            r#"
demo:
  requests_per_endpoint: 3
limits:
  disk:
    - requests_per_unit: 4
      unit: second
      burst: 4
"#,
        );

        let settings = Settings::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.demo.requests_per_endpoint, 3);
        assert_eq!(settings.limits.disk[0].rate(), Rate::per_second(4.0));
        assert_eq!(settings.limits.disk[0].burst, 4);
    }

    #[test]
    fn test_from_file_matches_load() {
        let path = write_temp("from-file", "demo:\n  requests_per_endpoint: 7\n");

        let settings = Settings::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.demo.requests_per_endpoint, 7);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("multilimiter-does-not-exist.yaml");

        assert!(matches!(Settings::load(Some(&path)), Err(LimiterError::Config(_))));
        assert!(matches!(Settings::from_file(&path), Err(LimiterError::Io(_))));
    }
}

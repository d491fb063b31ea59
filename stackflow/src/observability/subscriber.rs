//! Subscriber setup for binaries.

use crate::errors::StackflowError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
pub const LOG_ENV_VAR: &str = "STACKFLOW_LOG";

/// How log output is formatted and filtered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Filter used when `STACKFLOW_LOG` is unset or invalid.
    #[serde(default = "default_filter")]
    pub default_filter: String,
    /// Emit one JSON object per line.
    #[serde(default)]
    pub json: bool,
    /// Include the module path of each event.
    #[serde(default)]
    pub with_target: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_filter: default_filter(),
            json: false,
            with_target: false,
        }
    }
}

impl TracingConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches JSON output on or off.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Sets the fallback filter.
    #[must_use]
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    /// Builds the filter, preferring `STACKFLOW_LOG`.
    ///
    /// # Errors
    ///
    /// Returns an error if neither the environment nor the fallback holds
    /// valid directives.
    pub fn env_filter(&self) -> Result<EnvFilter, StackflowError> {
        match EnvFilter::try_from_env(LOG_ENV_VAR) {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.default_filter).map_err(|e| {
                StackflowError::Config(format!(
                    "invalid log filter '{}': {e}",
                    self.default_filter
                ))
            }),
        }
    }
}

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a global subscriber is
/// already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<(), StackflowError> {
    let filter = config.env_filter()?;
    let result = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(config.with_target)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.with_target)
            .try_init()
    };
    result.map_err(|e| StackflowError::Internal(format!("cannot install tracing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.default_filter, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_invalid_fallback_filter() {
        let config = TracingConfig::new().with_default_filter("stackflow=loud");
        if std::env::var(LOG_ENV_VAR).is_err() {
            assert!(matches!(config.env_filter(), Err(StackflowError::Config(_))));
        }
    }

    #[test]
    fn test_config_from_json() {
        let config: TracingConfig = serde_json::from_str(r#"{"json": true}"#).unwrap();
        assert!(config.json);
        assert_eq!(config.default_filter, "info");
    }
}

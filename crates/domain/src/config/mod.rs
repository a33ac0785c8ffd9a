mod database;
mod limits;
mod llm;
mod observability;
mod server;

pub use database::*;
pub use limits::*;
pub use llm::*;
pub use observability::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if !self.server.api_prefix.is_empty() && !self.server.api_prefix.starts_with('/') {
            errors.push(ConfigError::error(
                "server.api_prefix",
                "prefix must start with '/'",
            ));
        }
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }
        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 || rl.burst_size == 0 {
                errors.push(ConfigError::error(
                    "server.rate_limit",
                    "requests_per_second and burst_size must be > 0",
                ));
            }
        }

        if self.llm.base_url.is_empty() {
            errors.push(ConfigError::error("llm.base_url", "base_url must not be empty"));
        }
        if self.llm.model.is_empty() {
            errors.push(ConfigError::error("llm.model", "model must not be empty"));
        }

        let ceilings = &self.limits.conversation;
        for (field, value) in [
            ("limits.conversation.max_requests", ceilings.max_requests),
            ("limits.conversation.max_tokens", ceilings.max_tokens),
            ("limits.conversation.max_tool_calls", ceilings.max_tool_calls),
        ] {
            if value == 0 {
                errors.push(ConfigError::error(field, "ceiling must be greater than 0"));
            }
        }

        let budgets = &self.limits.agents;
        for (role, budget) in [
            ("router", budgets.router),
            ("query", budgets.query),
            ("chart", budgets.chart),
        ] {
            if budget.request_ceiling == 0 || budget.token_ceiling == 0 {
                errors.push(ConfigError::error(
                    format!("limits.agents.{role}"),
                    "request_ceiling and token_ceiling must be greater than 0",
                ));
            }
        }

        let demo = &self.limits.demo;
        if demo.queries_per_window == 0 {
            errors.push(ConfigError::error(
                "limits.demo.queries_per_window",
                "quota must be greater than 0",
            ));
        }
        if demo.window_secs == 0 {
            errors.push(ConfigError::error(
                "limits.demo.window_secs",
                "window must be greater than 0",
            ));
        }

        if self.limits.eviction.sweep_interval_secs == 0 {
            errors.push(ConfigError::warning(
                "limits.eviction.sweep_interval_secs",
                "eviction disabled; usage state grows with every conversation and origin",
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn zero_ceiling_is_an_error() {
        let mut cfg = Config::default();
        cfg.limits.conversation.max_tokens = 0;
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].severity, ConfigSeverity::Error);
        assert_eq!(errors[0].field, "limits.conversation.max_tokens");
    }

    #[test]
    fn disabled_eviction_is_a_warning() {
        let mut cfg = Config::default();
        cfg.limits.eviction.sweep_interval_secs = 0;
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].severity, ConfigSeverity::Warning);
    }

    #[test]
    fn prefix_without_slash_rejected() {
        let mut cfg = Config::default();
        cfg.server.api_prefix = "api".into();
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "server.api_prefix"));
    }
}

//! Pipeline configuration.
//!
//! Read once at process start, validated before the first request. Any
//! error here is fatal: the host refuses to start rather than serve
//! responses with a broken policy.

use edge_cache::CacheControlConfig;
use edge_core::{Environment, PatternError};
use edge_security::{
    validate_csp_config, validate_security_headers_config, CspConfig, CspError,
    SecurityHeadersConfig, SecurityHeadersError, DEFAULT_REPORT_URI,
};
use serde::Serialize;

use crate::circuit_breaker::CircuitBreakerConfig;

/// Environment variable names.
pub mod env_vars {
    pub const CSP_ENABLED: &str = "EDGE_CSP_ENABLED";
    pub const CSP_REPORT_ONLY: &str = "EDGE_CSP_REPORT_ONLY";
    pub const CSP_REPORT_URI: &str = "EDGE_CSP_REPORT_URI";
    pub const CACHE_CONTROL_ENABLED: &str = "EDGE_CACHE_CONTROL_ENABLED";
    pub const ENV: &str = "EDGE_ENV";
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("CSP config: {0}")]
    Csp(#[from] CspError),

    #[error("cache route pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("security headers config: {0}")]
    SecurityHeaders(#[from] SecurityHeadersError),
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    /// Emit a CSP header and nonce.
    pub csp_enabled: bool,
    /// Use the report-only CSP header name.
    pub csp_report_only: bool,
    /// Violation report endpoint; `None` omits `report-uri`.
    pub csp_report_uri: Option<String>,
    /// Emit Cache-Control.
    pub cache_control_enabled: bool,
    /// Deployment environment.
    pub environment: Environment,
    /// Base CSP directives, before environment and reporting adjustments.
    pub csp: CspConfig,
    /// Route patterns for cache classification.
    pub cache: CacheControlConfig,
    /// Hardening headers.
    pub security_headers: SecurityHeadersConfig,
    /// Breaker thresholds.
    #[serde(skip)]
    pub breaker: CircuitBreakerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            csp_enabled: true,
            csp_report_only: false,
            csp_report_uri: Some(DEFAULT_REPORT_URI.to_string()),
            cache_control_enabled: true,
            environment: Environment::Production,
            csp: CspConfig::balanced(),
            cache: CacheControlConfig::default(),
            security_headers: SecurityHeadersConfig::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using a custom variable lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_lookup(lookup)?;
        Ok(config)
    }

    /// Override fields from a variable lookup. Unset variables keep their
    /// current value.
    pub fn apply_lookup<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(env_vars::CSP_ENABLED) {
            self.csp_enabled = parse_bool(env_vars::CSP_ENABLED, &value)?;
        }
        if let Some(value) = lookup(env_vars::CSP_REPORT_ONLY) {
            self.csp_report_only = parse_bool(env_vars::CSP_REPORT_ONLY, &value)?;
        }
        if let Some(value) = lookup(env_vars::CSP_REPORT_URI) {
            let value = value.trim();
            self.csp_report_uri = (!value.is_empty()).then(|| value.to_string());
        }
        if let Some(value) = lookup(env_vars::CACHE_CONTROL_ENABLED) {
            self.cache_control_enabled = parse_bool(env_vars::CACHE_CONTROL_ENABLED, &value)?;
        }
        if let Some(value) = lookup(env_vars::ENV) {
            self.environment = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: env_vars::ENV.to_string(),
                value,
            })?;
        }
        Ok(())
    }

    /// The CSP actually emitted: base directives widened for the
    /// environment, with reporting settings applied.
    pub fn effective_csp(&self) -> CspConfig {
        self.csp
            .clone()
            .for_environment(self.environment)
            .with_report_only(self.csp_report_only)
            .with_report_uri(self.csp_report_uri.clone())
    }

    /// Run every load-time check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.csp_enabled {
            validate_csp_config(&self.effective_csp())?;
        }
        // Patterns are compiled at startup even when emission is off.
        edge_cache::CachePolicyResolver::new(&self.cache)?;
        validate_security_headers_config(&self.security_headers)?;
        Ok(())
    }
}

/// Parse a boolean flag: `1/0`, `true/false`, `yes/no`, `on/off`.
pub fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use rstest::rstest;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.csp_enabled);
        assert!(!config.csp_report_only);
        assert_eq!(config.csp_report_uri.as_deref(), Some("/api/csp-report"));
        assert!(config.cache_control_enabled);
        assert_eq!(config.environment, Environment::Production);
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case("1", true)]
    #[case("TRUE", true)]
    #[case(" yes ", true)]
    #[case("on", true)]
    #[case("0", false)]
    #[case("False", false)]
    #[case("no", false)]
    #[case("OFF", false)]
    fn test_parse_bool(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(parse_bool("X", input), Ok(expected));
    }

    #[test]
    fn test_invalid_bool() {
        let err = PipelineConfig::from_lookup(lookup(&[("EDGE_CSP_ENABLED", "maybe")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "EDGE_CSP_ENABLED".to_string(),
                value: "maybe".to_string()
            }
        );
    }

    #[test]
    fn test_overrides() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("EDGE_CSP_ENABLED", "false"),
            ("EDGE_CSP_REPORT_ONLY", "1"),
            ("EDGE_CSP_REPORT_URI", "https://reports.example.com/csp"),
            ("EDGE_CACHE_CONTROL_ENABLED", "off"),
            ("EDGE_ENV", "dev"),
        ]))
        .unwrap();

        assert!(!config.csp_enabled);
        assert!(config.csp_report_only);
        assert_eq!(
            config.csp_report_uri.as_deref(),
            Some("https://reports.example.com/csp")
        );
        assert!(!config.cache_control_enabled);
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_empty_report_uri_disables_reporting() {
        let config = PipelineConfig::from_lookup(lookup(&[("EDGE_CSP_REPORT_URI", "")])).unwrap();
        assert_eq!(config.csp_report_uri, None);
        assert_eq!(config.effective_csp().report_uri, None);
    }

    #[test]
    fn test_unknown_environment() {
        let err = PipelineConfig::from_lookup(lookup(&[("EDGE_ENV", "staging")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "EDGE_ENV"));
    }

    #[test]
    fn test_effective_csp_in_development() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("EDGE_ENV", "development"),
            ("EDGE_CSP_REPORT_ONLY", "true"),
        ]))
        .unwrap();
        let csp = config.effective_csp();

        assert!(csp.report_only);
        assert!(csp.directives["script-src"].contains(&"'unsafe-eval'".to_string()));
        assert!(csp.directives["style-src"].contains(&"'unsafe-inline'".to_string()));
    }

    #[test]
    fn test_validate_reports_each_kind() {
        let mut config = PipelineConfig::default();
        config.csp.directives.shift_remove("default-src");
        assert_eq!(
            config.validate(),
            Err(ConfigError::Csp(CspError::MissingDefaultSrc))
        );

        let mut config = PipelineConfig::default();
        config.cache = CacheControlConfig::empty().sensitive("/api/**x");
        assert!(matches!(config.validate(), Err(ConfigError::Pattern(_))));

        let mut config = PipelineConfig::default();
        config.security_headers = config.security_headers.with_hsts(60, true, true);
        assert!(matches!(config.validate(), Err(ConfigError::SecurityHeaders(_))));
    }

    #[test]
    fn test_disabled_steps_skip_validation() {
        let mut config = PipelineConfig::default();
        config.csp_enabled = false;
        config.csp.directives.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_cache_pattern_rejected_while_disabled() {
        let mut config = PipelineConfig::default();
        config.cache_control_enabled = false;
        config.cache = CacheControlConfig::empty().sensitive("/api/**x");
        assert!(matches!(config.validate(), Err(ConfigError::Pattern(_))));
    }
}

//! CLI configuration file (`edge.toml`).
//!
//! ```toml
//! [pipeline]
//! csp_enabled = true
//! csp_report_only = false
//! csp_report_uri = "/api/csp-report"
//! cache_control_enabled = true
//! environment = "production"
//! csp_preset = "balanced"
//!
//! [cache]
//! sensitive_routes = ["/api/**"]
//!
//! [csp.directives]
//! default-src = ["'self'"]
//! ```
//!
//! Values set in the file override the environment.

use anyhow::{Context, Result};
use edge_sdk::edge_cache::CacheControlConfig;
use edge_sdk::edge_core::Environment;
use edge_sdk::edge_executor::PipelineConfig;
use edge_sdk::edge_security::{CspConfig, SecurityHeadersConfig};
use serde::{Deserialize, Serialize};

/// CLI configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Pipeline switches.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Cache route patterns; replaces the defaults when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheControlConfig>,

    /// Hardening headers; replaces the defaults when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_headers: Option<SecurityHeadersConfig>,

    /// Raw CSP table, checked with `CspConfig::from_value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csp: Option<toml::Value>,
}

/// `[pipeline]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSection {
    pub csp_enabled: Option<bool>,
    pub csp_report_only: Option<bool>,
    /// Empty string disables reporting.
    pub csp_report_uri: Option<String>,
    pub cache_control_enabled: Option<bool>,
    pub environment: Option<Environment>,
    pub csp_preset: Option<CspPreset>,
}

/// Built-in CSP directive sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CspPreset {
    Balanced,
    Strict,
    Relaxed,
}

impl CspPreset {
    pub fn config(&self) -> CspConfig {
        match self {
            Self::Balanced => CspConfig::balanced(),
            Self::Strict => CspConfig::strict(),
            Self::Relaxed => CspConfig::relaxed(),
        }
    }
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            Self::parse_toml(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }

    /// Parse TOML config text.
    pub fn parse_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply file values on top of an environment-derived config.
    pub fn apply(&self, config: &mut PipelineConfig) -> Result<()> {
        let section = &self.pipeline;

        if let Some(enabled) = section.csp_enabled {
            config.csp_enabled = enabled;
        }
        if let Some(report_only) = section.csp_report_only {
            config.csp_report_only = report_only;
        }
        if let Some(uri) = &section.csp_report_uri {
            let uri = uri.trim();
            config.csp_report_uri = (!uri.is_empty()).then(|| uri.to_string());
        }
        if let Some(enabled) = section.cache_control_enabled {
            config.cache_control_enabled = enabled;
        }
        if let Some(environment) = section.environment {
            config.environment = environment;
        }
        if let Some(preset) = section.csp_preset {
            config.csp = preset.config();
        }

        if let Some(raw) = &self.csp {
            let value = serde_json::to_value(raw).context("CSP table is not representable")?;
            config.csp = CspConfig::from_value(value).context("Invalid [csp] table")?;
        }
        if let Some(cache) = &self.cache {
            config.cache = cache.clone();
        }
        if let Some(headers) = &self.security_headers {
            config.security_headers = headers.clone();
        }

        Ok(())
    }
}

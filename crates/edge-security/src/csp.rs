//! Content-Security-Policy assembly.
//!
//! The directive table is static configuration. Per request, the nonce is
//! injected into a copy of the table and the copy is serialized; the
//! shared table is never mutated.

use edge_core::{header_names, Environment};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::nonce::nonce_source;

/// Ordered directive table: directive name -> source list.
pub type CspDirectives = IndexMap<String, Vec<String>>;

/// Directive that receives the nonce for inline scripts.
pub const SCRIPT_SRC: &str = "script-src";
/// Directive that receives the nonce for inline styles.
pub const STYLE_SRC: &str = "style-src";
/// Fallback directive every policy must define.
pub const DEFAULT_SRC: &str = "default-src";
/// Default endpoint for violation reports.
pub const DEFAULT_REPORT_URI: &str = "/api/csp-report";

/// Errors from CSP configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CspError {
    #[error("CSP config has no directives table")]
    MissingDirectives,

    #[error("CSP directives must be a map of directive name to source list")]
    DirectivesNotAMap,

    #[error("CSP config must define default-src")]
    MissingDefaultSrc,

    #[error("CSP directive name is empty")]
    EmptyDirectiveName,

    #[error("invalid source '{token}' in CSP directive '{directive}'")]
    InvalidSource { directive: String, token: String },

    #[error("invalid CSP report URI: {0}")]
    InvalidReportUri(String),

    #[error("malformed CSP config: {0}")]
    Malformed(String),
}

/// Content-Security-Policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CspConfig {
    /// Directive table in serialization order.
    pub directives: CspDirectives,
    /// Emit `Content-Security-Policy-Report-Only` instead of enforcing.
    #[serde(default)]
    pub report_only: bool,
    /// Violation report endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_uri: Option<String>,
}

impl Default for CspConfig {
    fn default() -> Self {
        Self::balanced()
    }
}

impl CspConfig {
    /// Create a config from a directive table.
    pub fn new(directives: CspDirectives) -> Self {
        Self {
            directives,
            report_only: false,
            report_uri: None,
        }
    }

    /// BALANCED preset: same-origin everything, no inline code except nonced.
    pub fn balanced() -> Self {
        Self::new(IndexMap::new())
            .directive(DEFAULT_SRC, &["'self'"])
            .directive(SCRIPT_SRC, &["'self'"])
            .directive(STYLE_SRC, &["'self'"])
            .directive("img-src", &["'self'", "data:", "blob:", "https:"])
            .directive("font-src", &["'self'", "data:"])
            .directive("connect-src", &["'self'"])
            .directive("media-src", &["'self'"])
            .directive("object-src", &["'none'"])
            .directive("frame-ancestors", &["'none'"])
            .directive("base-uri", &["'self'"])
            .directive("form-action", &["'self'"])
            .directive("upgrade-insecure-requests", &[])
    }

    /// STRICT preset: nonce-propagated scripts only, no base URI changes.
    pub fn strict() -> Self {
        Self::new(IndexMap::new())
            .directive(DEFAULT_SRC, &["'self'"])
            .directive(SCRIPT_SRC, &["'strict-dynamic'"])
            .directive(STYLE_SRC, &["'self'"])
            .directive("img-src", &["'self'"])
            .directive("font-src", &["'self'"])
            .directive("connect-src", &["'self'"])
            .directive("object-src", &["'none'"])
            .directive("frame-ancestors", &["'none'"])
            .directive("base-uri", &["'none'"])
            .directive("form-action", &["'self'"])
            .directive("upgrade-insecure-requests", &[])
    }

    /// RELAXED preset: allows HTTPS third parties for scripts, styles and fonts.
    pub fn relaxed() -> Self {
        Self::new(IndexMap::new())
            .directive(DEFAULT_SRC, &["'self'"])
            .directive(SCRIPT_SRC, &["'self'", "https:"])
            .directive(STYLE_SRC, &["'self'", "'unsafe-inline'", "https:"])
            .directive("img-src", &["*", "data:", "blob:"])
            .directive("font-src", &["'self'", "https:", "data:"])
            .directive("connect-src", &["'self'", "https:", "wss:"])
            .directive("frame-ancestors", &["'self'"])
    }

    /// Add or replace a directive.
    pub fn directive(mut self, name: &str, sources: &[&str]) -> Self {
        self.directives.insert(
            name.to_string(),
            sources.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Set report-only mode.
    pub fn with_report_only(mut self, report_only: bool) -> Self {
        self.report_only = report_only;
        self
    }

    /// Set the report endpoint.
    pub fn with_report_uri(mut self, uri: Option<impl Into<String>>) -> Self {
        self.report_uri = uri.map(Into::into);
        self
    }

    /// Adjust the policy for an environment.
    ///
    /// Development widens `script-src` with `'unsafe-eval'` and
    /// `'unsafe-inline'`, and `style-src` with `'unsafe-inline'`, for
    /// hot-reload tooling. Production is returned unchanged.
    pub fn for_environment(mut self, env: Environment) -> Self {
        if !env.is_development() {
            return self;
        }

        if let Some(sources) = self.directives.get_mut(SCRIPT_SRC) {
            push_unique(sources, "'unsafe-eval'");
            push_unique(sources, "'unsafe-inline'");
        }
        if let Some(sources) = self.directives.get_mut(STYLE_SRC) {
            push_unique(sources, "'unsafe-inline'");
        }
        self
    }

    /// Parse a config from an untyped document, e.g. a JSON or TOML table.
    ///
    /// Distinguishes a missing `directives` key and a `directives` value
    /// that is not a map from other malformed input.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CspError> {
        match value.get("directives") {
            None | Some(serde_json::Value::Null) => return Err(CspError::MissingDirectives),
            Some(serde_json::Value::Object(_)) => {}
            Some(_) => return Err(CspError::DirectivesNotAMap),
        }

        serde_json::from_value(value).map_err(|e| CspError::Malformed(e.to_string()))
    }

    /// Header name for this config's mode.
    pub fn header_name(&self) -> &'static str {
        if self.report_only {
            header_names::CONTENT_SECURITY_POLICY_REPORT_ONLY
        } else {
            header_names::CONTENT_SECURITY_POLICY
        }
    }
}

fn push_unique(sources: &mut Vec<String>, token: &str) {
    if !sources.iter().any(|s| s == token) {
        sources.push(token.to_string());
    }
}

/// A rendered CSP header for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CspResult {
    /// `Content-Security-Policy` or `Content-Security-Policy-Report-Only`.
    pub header_name: String,
    /// Serialized policy.
    pub header_value: String,
    /// Nonce embedded in the policy.
    pub nonce: String,
}

/// Build the CSP header for a request.
///
/// The nonce source is placed first in `script-src` and `style-src` when
/// those directives exist; directives missing from the table are not added.
pub fn build_csp_header(config: &CspConfig, nonce: &str) -> CspResult {
    let mut directives = config.directives.clone();
    let token = nonce_source(nonce);

    for name in [SCRIPT_SRC, STYLE_SRC] {
        if let Some(sources) = directives.get_mut(name) {
            sources.insert(0, token.clone());
        }
    }

    let mut header_value = serialize_directives(&directives);

    if let Some(uri) = &config.report_uri {
        header_value.push_str("; report-uri ");
        header_value.push_str(uri);
    }

    CspResult {
        header_name: config.header_name().to_string(),
        header_value,
        nonce: nonce.to_string(),
    }
}

/// Serialize a directive table as `"name src src; name src"`.
pub fn serialize_directives(directives: &CspDirectives) -> String {
    directives
        .iter()
        .map(|(name, sources)| {
            if sources.is_empty() {
                name.clone()
            } else {
                format!("{} {}", name, sources.join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate a CSP config at load time.
pub fn validate_csp_config(config: &CspConfig) -> Result<(), CspError> {
    if !config.directives.contains_key(DEFAULT_SRC) {
        return Err(CspError::MissingDefaultSrc);
    }

    for (name, sources) in &config.directives {
        if name.trim().is_empty() {
            return Err(CspError::EmptyDirectiveName);
        }
        if let Some(bad) = sources.iter().find(|s| !is_valid_token(s)) {
            return Err(CspError::InvalidSource {
                directive: name.clone(),
                token: bad.clone(),
            });
        }
    }

    if let Some(uri) = &config.report_uri {
        if !is_valid_token(uri) {
            return Err(CspError::InvalidReportUri(uri.clone()));
        }
    }

    Ok(())
}

fn is_valid_token(token: &str) -> bool {
    !token.is_empty() && !token.chars().any(|c| c == ';' || c == ',' || c.is_whitespace())
}

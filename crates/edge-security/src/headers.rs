//! Hardening response headers.

use std::fmt;

use edge_core::{header_names, HeaderSet};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Minimum HSTS max-age (one year) accepted for production.
pub const MIN_HSTS_MAX_AGE: u64 = 31_536_000;

/// Errors from security-header configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityHeadersError {
    #[error("HSTS max-age {max_age} is below the minimum of {minimum} seconds")]
    HstsMaxAgeTooShort { max_age: u64, minimum: u64 },

    #[error("referrer policy is not configured")]
    MissingReferrerPolicy,

    #[error("frame options are not configured")]
    MissingFrameOptions,

    #[error("invalid permissions-policy entry for feature '{0}'")]
    InvalidPermission(String),
}

/// HTTP Strict-Transport-Security settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HstsConfig {
    /// Seconds browsers should remember to use HTTPS only.
    pub max_age: u64,
    /// Apply to all subdomains.
    pub include_sub_domains: bool,
    /// Request inclusion in browser preload lists.
    pub preload: bool,
}

impl Default for HstsConfig {
    fn default() -> Self {
        Self {
            max_age: 63_072_000, // 2 years
            include_sub_domains: true,
            preload: true,
        }
    }
}

impl HstsConfig {
    /// Render the header value.
    pub fn header_value(&self) -> String {
        let mut value = format!("max-age={}", self.max_age);
        if self.include_sub_domains {
            value.push_str("; includeSubDomains");
        }
        if self.preload {
            value.push_str("; preload");
        }
        value
    }
}

/// Referrer-Policy values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferrerPolicy {
    NoReferrer,
    NoReferrerWhenDowngrade,
    Origin,
    OriginWhenCrossOrigin,
    SameOrigin,
    StrictOrigin,
    StrictOriginWhenCrossOrigin,
    UnsafeUrl,
}

impl ReferrerPolicy {
    /// Header value for this policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoReferrer => "no-referrer",
            Self::NoReferrerWhenDowngrade => "no-referrer-when-downgrade",
            Self::Origin => "origin",
            Self::OriginWhenCrossOrigin => "origin-when-cross-origin",
            Self::SameOrigin => "same-origin",
            Self::StrictOrigin => "strict-origin",
            Self::StrictOriginWhenCrossOrigin => "strict-origin-when-cross-origin",
            Self::UnsafeUrl => "unsafe-url",
        }
    }
}

impl fmt::Display for ReferrerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// X-Frame-Options values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameOptions {
    Deny,
    SameOrigin,
}

impl FrameOptions {
    /// Header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deny => "DENY",
            Self::SameOrigin => "SAMEORIGIN",
        }
    }
}

impl fmt::Display for FrameOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permissions-Policy table: feature -> allowed origins.
///
/// An empty origin list disables the feature everywhere.
pub type PermissionsPolicy = IndexMap<String, Vec<String>>;

/// Static hardening-header configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityHeadersConfig {
    /// Strict-Transport-Security settings.
    pub hsts: HstsConfig,
    /// Referrer-Policy.
    pub referrer_policy: Option<ReferrerPolicy>,
    /// X-Frame-Options.
    pub frame_options: Option<FrameOptions>,
    /// Permissions-Policy.
    #[serde(default)]
    pub permissions_policy: PermissionsPolicy,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        let mut permissions_policy = PermissionsPolicy::new();
        for feature in [
            "camera",
            "microphone",
            "geolocation",
            "payment",
            "usb",
            "interest-cohort",
        ] {
            permissions_policy.insert(feature.to_string(), Vec::new());
        }
        permissions_policy.insert("fullscreen".to_string(), vec!["self".to_string()]);

        Self {
            hsts: HstsConfig::default(),
            referrer_policy: Some(ReferrerPolicy::StrictOriginWhenCrossOrigin),
            frame_options: Some(FrameOptions::Deny),
            permissions_policy,
        }
    }
}

impl SecurityHeadersConfig {
    /// Set HSTS settings.
    pub fn with_hsts(mut self, max_age: u64, include_sub_domains: bool, preload: bool) -> Self {
        self.hsts = HstsConfig {
            max_age,
            include_sub_domains,
            preload,
        };
        self
    }

    /// Set the referrer policy.
    pub fn with_referrer_policy(mut self, policy: ReferrerPolicy) -> Self {
        self.referrer_policy = Some(policy);
        self
    }

    /// Set frame options.
    pub fn with_frame_options(mut self, options: FrameOptions) -> Self {
        self.frame_options = Some(options);
        self
    }

    /// Add or replace a permissions-policy feature.
    pub fn with_permission(mut self, feature: &str, origins: &[&str]) -> Self {
        self.permissions_policy.insert(
            feature.to_string(),
            origins.iter().map(|o| o.to_string()).collect(),
        );
        self
    }
}

/// Render the Permissions-Policy header value.
pub fn permissions_policy_value(policy: &PermissionsPolicy) -> String {
    policy
        .iter()
        .map(|(feature, origins)| format!("{}=({})", feature, origins.join(" ")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Assemble the six hardening headers.
///
/// Fails only if referrer policy or frame options are missing, which
/// `validate_security_headers_config` rejects at load time.
pub fn generate_security_headers(
    config: &SecurityHeadersConfig,
) -> Result<HeaderSet, SecurityHeadersError> {
    let referrer = config
        .referrer_policy
        .ok_or(SecurityHeadersError::MissingReferrerPolicy)?;
    let frame = config
        .frame_options
        .ok_or(SecurityHeadersError::MissingFrameOptions)?;

    Ok(HeaderSet::new()
        .with(header_names::STRICT_TRANSPORT_SECURITY, config.hsts.header_value())
        .with(header_names::REFERRER_POLICY, referrer.as_str())
        .with(header_names::X_FRAME_OPTIONS, frame.as_str())
        .with(header_names::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .with(header_names::X_XSS_PROTECTION, "1; mode=block")
        .with(
            header_names::PERMISSIONS_POLICY,
            permissions_policy_value(&config.permissions_policy),
        ))
}

/// Validate a security-header config at load time.
pub fn validate_security_headers_config(
    config: &SecurityHeadersConfig,
) -> Result<(), SecurityHeadersError> {
    if config.hsts.max_age < MIN_HSTS_MAX_AGE {
        return Err(SecurityHeadersError::HstsMaxAgeTooShort {
            max_age: config.hsts.max_age,
            minimum: MIN_HSTS_MAX_AGE,
        });
    }
    if config.referrer_policy.is_none() {
        return Err(SecurityHeadersError::MissingReferrerPolicy);
    }
    if config.frame_options.is_none() {
        return Err(SecurityHeadersError::MissingFrameOptions);
    }

    for (feature, origins) in &config.permissions_policy {
        let bad_feature = feature.is_empty()
            || !feature
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        let bad_origin = origins
            .iter()
            .any(|o| o.is_empty() || o.contains([',', '(', ')']) || o.contains(char::is_whitespace));
        if bad_feature || bad_origin {
            return Err(SecurityHeadersError::InvalidPermission(feature.clone()));
        }
    }

    Ok(())
}

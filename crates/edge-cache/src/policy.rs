//! Route-based cache policies.

use std::fmt;

use edge_core::{PatternError, PatternSet};
use serde::{Deserialize, Serialize};

/// Cache class assigned to a request path.
///
/// Classes are checked in declaration order; the first that matches wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// APIs and user data. Never stored.
    Sensitive,
    /// Login and session flows. Always revalidated.
    Auth,
    /// Fingerprinted static assets. Cached for a year.
    Public,
    /// Everything else. Cacheable but revalidated on every use.
    Default,
}

impl CachePolicy {
    /// The Cache-Control value for this class.
    pub fn directive(&self) -> &'static str {
        match self {
            Self::Sensitive => "no-store, no-cache, must-revalidate, max-age=0, private",
            Self::Auth => "no-cache, must-revalidate, max-age=0",
            Self::Public => "public, max-age=31536000, immutable",
            Self::Default => "public, max-age=0, must-revalidate",
        }
    }

    /// Lowercase class name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sensitive => "sensitive",
            Self::Auth => "auth",
            Self::Public => "public",
            Self::Default => "default",
        }
    }

    /// Check if shared caches may store the response.
    pub fn allows_cdn_caching(&self) -> bool {
        matches!(self, Self::Public | Self::Default)
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route patterns per cache class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheControlConfig {
    #[serde(default)]
    pub sensitive_routes: Vec<String>,
    #[serde(default)]
    pub auth_routes: Vec<String>,
    #[serde(default)]
    pub public_routes: Vec<String>,
}

impl Default for CacheControlConfig {
    fn default() -> Self {
        fn owned(patterns: &[&str]) -> Vec<String> {
            patterns.iter().map(|p| p.to_string()).collect()
        }

        Self {
            sensitive_routes: owned(&["/api/**", "/admin/**", "/account/**", "/checkout/**"]),
            auth_routes: owned(&[
                "/login",
                "/logout",
                "/signup",
                "/auth/**",
                "/reset-password/**",
            ]),
            public_routes: owned(&[
                "/_next/static/**",
                "/static/**",
                "/assets/**",
                "/fonts/**",
                "/images/**",
                "/favicon.ico",
                "/**/*.woff2",
            ]),
        }
    }
}

impl CacheControlConfig {
    /// A config with no patterns; every path resolves to `Default`.
    pub fn empty() -> Self {
        Self {
            sensitive_routes: Vec::new(),
            auth_routes: Vec::new(),
            public_routes: Vec::new(),
        }
    }

    /// Add a sensitive route pattern.
    pub fn sensitive(mut self, pattern: impl Into<String>) -> Self {
        self.sensitive_routes.push(pattern.into());
        self
    }

    /// Add an auth route pattern.
    pub fn auth(mut self, pattern: impl Into<String>) -> Self {
        self.auth_routes.push(pattern.into());
        self
    }

    /// Add a public route pattern.
    pub fn public(mut self, pattern: impl Into<String>) -> Self {
        self.public_routes.push(pattern.into());
        self
    }
}

/// Compiled cache classifier.
#[derive(Debug, Clone)]
pub struct CachePolicyResolver {
    sensitive: PatternSet,
    auth: PatternSet,
    public: PatternSet,
}

impl CachePolicyResolver {
    /// Compile every pattern in the config.
    pub fn new(config: &CacheControlConfig) -> Result<Self, PatternError> {
        Ok(Self {
            sensitive: PatternSet::new(&config.sensitive_routes)?,
            auth: PatternSet::new(&config.auth_routes)?,
            public: PatternSet::new(&config.public_routes)?,
        })
    }

    /// Classify a request path.
    pub fn resolve(&self, path: &str) -> CachePolicy {
        let policy = if self.sensitive.matches_any(path) {
            CachePolicy::Sensitive
        } else if self.auth.matches_any(path) {
            CachePolicy::Auth
        } else if self.public.matches_any(path) {
            CachePolicy::Public
        } else {
            CachePolicy::Default
        };

        tracing::trace!(path, policy = policy.as_str(), "Resolved cache policy");
        policy
    }

    /// Classify a path and return its Cache-Control value.
    pub fn cache_control(&self, path: &str) -> &'static str {
        self.resolve(path).directive()
    }
}

/// One-shot helper: compile the config and resolve a single path.
pub fn generate_cache_control(
    path: &str,
    config: &CacheControlConfig,
) -> Result<&'static str, PatternError> {
    Ok(CachePolicyResolver::new(config)?.cache_control(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn resolver() -> CachePolicyResolver {
        CachePolicyResolver::new(&CacheControlConfig::default()).unwrap()
    }

    #[rstest]
    #[case("/api/subscribe", CachePolicy::Sensitive)]
    #[case("/API/Subscribe", CachePolicy::Sensitive)]
    #[case("/admin/users/42", CachePolicy::Sensitive)]
    #[case("/checkout/payment", CachePolicy::Sensitive)]
    #[case("/login", CachePolicy::Auth)]
    #[case("/login?next=/account", CachePolicy::Auth)]
    #[case("/auth/callback/github", CachePolicy::Auth)]
    #[case("/_next/static/main.js", CachePolicy::Public)]
    #[case("/_next/static/chunks/pages/index.js", CachePolicy::Public)]
    #[case("/favicon.ico", CachePolicy::Public)]
    #[case("/fonts/inter.woff2", CachePolicy::Public)]
    #[case("/vendor/icons.woff2", CachePolicy::Public)]
    #[case("/unmatched-route", CachePolicy::Default)]
    #[case("", CachePolicy::Default)]
    #[case("/", CachePolicy::Default)]
    fn test_default_classification(#[case] path: &str, #[case] expected: CachePolicy) {
        assert_eq!(resolver().resolve(path), expected, "{}", path);
    }

    #[test]
    fn test_directives() {
        assert_eq!(
            generate_cache_control("/api/subscribe", &CacheControlConfig::default()).unwrap(),
            "no-store, no-cache, must-revalidate, max-age=0, private"
        );
        assert_eq!(
            generate_cache_control("/_next/static/main.js", &CacheControlConfig::default())
                .unwrap(),
            "public, max-age=31536000, immutable"
        );
        assert_eq!(
            generate_cache_control("/unmatched-route", &CacheControlConfig::default()).unwrap(),
            "public, max-age=0, must-revalidate"
        );
        assert_eq!(
            CachePolicy::Auth.directive(),
            "no-cache, must-revalidate, max-age=0"
        );
    }

    #[test]
    fn test_sensitive_beats_public_on_overlap() {
        let config = CacheControlConfig::empty()
            .public("/api/assets/**")
            .sensitive("/api/**");
        let resolver = CachePolicyResolver::new(&config).unwrap();

        assert_eq!(resolver.resolve("/api/assets/logo.png"), CachePolicy::Sensitive);
    }

    #[test]
    fn test_auth_beats_public_on_overlap() {
        let config = CacheControlConfig::empty()
            .public("/**/*.js")
            .auth("/auth/**");
        let resolver = CachePolicyResolver::new(&config).unwrap();

        assert_eq!(resolver.resolve("/auth/sdk.js"), CachePolicy::Auth);
        assert_eq!(resolver.resolve("/app/sdk.js"), CachePolicy::Public);
    }

    #[test]
    fn test_empty_config_resolves_default() {
        let resolver = CachePolicyResolver::new(&CacheControlConfig::empty()).unwrap();
        assert_eq!(resolver.resolve("/api/anything"), CachePolicy::Default);
    }

    #[test]
    fn test_invalid_pattern_rejected_at_load() {
        let config = CacheControlConfig::empty().sensitive("/api/**x");
        assert!(matches!(
            CachePolicyResolver::new(&config),
            Err(PatternError::Invalid { .. })
        ));
        assert!(generate_cache_control("/api", &config).is_err());
    }

    #[test]
    fn test_config_deserializes_with_missing_lists() {
        let config: CacheControlConfig = serde_json::from_value(serde_json::json!({
            "sensitive_routes": ["/internal/**"]
        }))
        .unwrap();

        assert_eq!(config.sensitive_routes, vec!["/internal/**"]);
        assert!(config.public_routes.is_empty());
    }
}

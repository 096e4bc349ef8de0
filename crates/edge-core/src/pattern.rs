//! Route pattern matching.
//!
//! Patterns use shell-glob syntax and are matched case-insensitively
//! against the normalized request path:
//! - `*` matches within a single path segment (never crosses `/`)
//! - `**` matches any number of segments, including none
//! - `?` and `[...]` behave as in shell globs
//!
//! Examples:
//! - `/api/**` - matches `/api/subscribe`, `/API/v1/users`
//! - `/blog/*` - matches `/blog/hello` but not `/blog/2024/hello`
//! - `/**/*.woff2` - matches `/fonts/inter.woff2`

use glob::{MatchOptions, Pattern};

use crate::context::normalize_path;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Errors from pattern compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("empty route pattern")]
    Empty,

    #[error("invalid route pattern '{pattern}': {reason}")]
    Invalid { pattern: String, reason: String },
}

/// A compiled, case-insensitive route pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    compiled: Pattern,
}

impl RoutePattern {
    /// Compile a route pattern.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(PatternError::Empty);
        }

        let compiled = Pattern::new(trimmed).map_err(|e| PatternError::Invalid {
            pattern: trimmed.to_string(),
            reason: e.msg.to_string(),
        })?;

        Ok(Self {
            source: trimmed.to_string(),
            compiled,
        })
    }

    /// Check if a request path matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        self.compiled.matches_with(normalize_path(path), MATCH_OPTIONS)
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// An ordered list of compiled route patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<RoutePattern>,
}

impl PatternSet {
    /// Compile every pattern, failing on the first invalid one.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        let patterns = patterns
            .iter()
            .map(|p| RoutePattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Check if the path matches any pattern in the set.
    ///
    /// An empty set matches nothing.
    pub fn matches_any(&self, path: &str) -> bool {
        self.first_match(path).is_some()
    }

    /// The first pattern (in list order) that matches the path.
    pub fn first_match(&self, path: &str) -> Option<&RoutePattern> {
        let path = normalize_path(path);
        self.patterns.iter().find(|p| p.matches(path))
    }

    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Match a path against a single uncompiled pattern.
///
/// A malformed pattern never matches.
pub fn matches(path: &str, pattern: &str) -> bool {
    RoutePattern::new(pattern)
        .map(|p| p.matches(path))
        .unwrap_or(false)
}

/// Match a path against any of the given uncompiled patterns.
pub fn matches_any<S: AsRef<str>>(path: &str, patterns: &[S]) -> bool {
    patterns.iter().any(|p| matches(path, p.as_ref()))
}

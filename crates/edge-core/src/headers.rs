//! Response header set.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use indexmap::IndexMap;
use serde::Serialize;

/// Header names emitted by the pipeline.
pub mod header_names {
    /// Enforcing Content-Security-Policy.
    pub const CONTENT_SECURITY_POLICY: &str = "Content-Security-Policy";
    /// Report-only Content-Security-Policy.
    pub const CONTENT_SECURITY_POLICY_REPORT_ONLY: &str = "Content-Security-Policy-Report-Only";
    /// Cache-Control.
    pub const CACHE_CONTROL: &str = "Cache-Control";
    /// HTTP Strict-Transport-Security.
    pub const STRICT_TRANSPORT_SECURITY: &str = "Strict-Transport-Security";
    /// Referrer-Policy.
    pub const REFERRER_POLICY: &str = "Referrer-Policy";
    /// X-Frame-Options.
    pub const X_FRAME_OPTIONS: &str = "X-Frame-Options";
    /// X-Content-Type-Options.
    pub const X_CONTENT_TYPE_OPTIONS: &str = "X-Content-Type-Options";
    /// X-XSS-Protection.
    pub const X_XSS_PROTECTION: &str = "X-XSS-Protection";
    /// Permissions-Policy.
    pub const PERMISSIONS_POLICY: &str = "Permissions-Policy";
    /// Request ID for tracing.
    pub const X_REQUEST_ID: &str = "X-Request-ID";
    /// Internal request header carrying the CSP nonce to the renderer.
    pub const X_NONCE: &str = "x-nonce";
}

/// Insertion-ordered set of response headers.
///
/// Names keep the casing they were inserted with; lookups are
/// case-insensitive. Inserting an existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HeaderSet {
    entries: IndexMap<String, String>,
}

/// Error converting a header set into an `http::HeaderMap`.
#[derive(Debug, thiserror::Error)]
pub enum HeaderConversionError {
    #[error("invalid header name '{0}'")]
    InvalidName(String),

    #[error("invalid value for header '{0}'")]
    InvalidValue(String),
}

impl HeaderSet {
    /// Create an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any existing value with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => {
                if let Some((_, existing)) = self.entries.get_index_mut(idx) {
                    *existing = value;
                }
            }
            None => {
                self.entries.insert(name, value);
            }
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Merge another header set into this one; later values win.
    pub fn extend(&mut self, other: HeaderSet) {
        for (name, value) in other.entries {
            self.insert(name, value);
        }
    }

    /// Get a header value by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|idx| self.entries.get_index(idx))
            .map(|(_, v)| v.as_str())
    }

    /// Check if a header is present (case-insensitive).
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterate headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Header names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert into an `http::HeaderMap` for attaching to a response.
    pub fn to_header_map(&self) -> Result<HeaderMap, HeaderConversionError> {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HeaderConversionError::InvalidName(name.clone()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| HeaderConversionError::InvalidValue(name.clone()))?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .keys()
            .position(|k| k.eq_ignore_ascii_case(name))
    }
}

impl<'a> IntoIterator for &'a HeaderSet {
    type Item = (&'a String, &'a String);
    type IntoIter = indexmap::map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

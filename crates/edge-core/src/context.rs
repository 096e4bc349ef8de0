//! Inbound request context.

use std::collections::HashMap;

use rand::Rng;

use crate::headers::header_names;

/// Unique request identifier for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let suffix: u64 = rand::thread_rng().gen();
        Self(format!("{:x}-{:016x}", millis, suffix))
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// HTTP request headers.
pub type Headers = HashMap<String, String>;

/// The parts of an inbound request the pipeline looks at.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request identifier, taken from `X-Request-ID` when the client sent one.
    pub request_id: RequestId,
    /// Request path as received (may include a query string).
    pub path: String,
    /// HTTP headers.
    pub headers: Headers,
}

impl RequestContext {
    /// Create a new request context with no headers.
    pub fn new(path: impl Into<String>) -> Self {
        Self::from_parts(path, Headers::new())
    }

    /// Create a request context from a path and header map.
    pub fn from_parts(path: impl Into<String>, headers: Headers) -> Self {
        let request_id = find_header(&headers, header_names::X_REQUEST_ID)
            .filter(|id| !id.trim().is_empty())
            .map(|id| RequestId::from_string(id.trim()))
            .unwrap_or_else(RequestId::generate);

        Self {
            request_id,
            path: path.into(),
            headers,
        }
    }

    /// Add a header. Setting `X-Request-ID` also replaces the request ID.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if name.eq_ignore_ascii_case(header_names::X_REQUEST_ID) && !value.trim().is_empty() {
            self.request_id = RequestId::from_string(value.trim());
        }
        self.headers.insert(name, value);
        self
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Path with query/fragment removed; an empty path becomes `/`.
    pub fn normalized_path(&self) -> &str {
        normalize_path(&self.path)
    }
}

fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Normalize a request path for classification.
///
/// Drops everything from the first `?` or `#`, and maps an empty path to `/`.
pub fn normalize_path(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = &path[..end];
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

//! Per-request CSP nonces.

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Raw nonce length in bytes (128 bits).
pub const NONCE_BYTES: usize = 16;

/// A nonce minted for a single request.
///
/// Lives for one request, is never persisted, and is embedded both in the
/// CSP header and in the `nonce` attribute of inline scripts and styles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceContext {
    /// Base64-encoded random token.
    pub nonce: String,
    /// Unix timestamp (milliseconds) when the nonce was minted.
    pub timestamp: i64,
    /// Request the nonce belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl NonceContext {
    /// The nonce as it appears inside a CSP source list.
    pub fn source_token(&self) -> String {
        nonce_source(&self.nonce)
    }
}

/// Mints nonces from the thread-local CSPRNG.
///
/// `rand::thread_rng()` is a ChaCha generator seeded from the operating
/// system; if the OS entropy source is unavailable it panics, which is
/// treated as a fatal process condition rather than silently degrading.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonceGenerator;

impl NonceGenerator {
    /// Create a new generator.
    pub fn new() -> Self {
        Self
    }

    /// Mint a fresh nonce for a request.
    pub fn generate(&self, request_id: Option<&str>) -> NonceContext {
        let mut bytes = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);

        NonceContext {
            nonce: STANDARD.encode(bytes),
            timestamp: chrono::Utc::now().timestamp_millis(),
            request_id: request_id.map(str::to_string),
        }
    }
}

/// Mint a fresh nonce with the default generator.
pub fn generate_nonce(request_id: Option<&str>) -> NonceContext {
    NonceGenerator.generate(request_id)
}

/// Format a nonce as a CSP source token: `'nonce-<value>'`.
pub fn nonce_source(nonce: &str) -> String {
    format!("'nonce-{}'", nonce)
}

/// Check that a nonce only uses the base64 alphabet, so it can be embedded
/// between single quotes in a header value.
pub fn is_csp_safe_nonce(nonce: &str) -> bool {
    !nonce.is_empty()
        && nonce
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_nonce_shape() {
        let ctx = generate_nonce(Some("req-1"));

        // 16 bytes -> 24 base64 characters with padding
        assert_eq!(ctx.nonce.len(), 24);
        assert!(is_csp_safe_nonce(&ctx.nonce));
        assert_eq!(STANDARD.decode(&ctx.nonce).unwrap().len(), NONCE_BYTES);
        assert_eq!(ctx.request_id.as_deref(), Some("req-1"));
        assert!(ctx.timestamp > 0);
    }

    #[test]
    fn test_nonce_uniqueness() {
        let generator = NonceGenerator::new();
        let nonces: HashSet<String> = (0..10_000)
            .map(|_| generator.generate(None).nonce)
            .collect();
        assert_eq!(nonces.len(), 10_000);
    }

    #[test]
    fn test_source_token() {
        let ctx = NonceContext {
            nonce: "abc=".to_string(),
            timestamp: 0,
            request_id: None,
        };
        assert_eq!(ctx.source_token(), "'nonce-abc='");
    }

    #[test]
    fn test_csp_safe_rejects_quotes() {
        assert!(!is_csp_safe_nonce("abc'def"));
        assert!(!is_csp_safe_nonce("a b"));
        assert!(!is_csp_safe_nonce(""));
    }

    proptest! {
        #[test]
        fn prop_every_nonce_is_csp_safe(request_id in proptest::option::of("[a-z0-9-]{1,16}")) {
            let ctx = generate_nonce(request_id.as_deref());
            prop_assert!(is_csp_safe_nonce(&ctx.nonce));
            prop_assert_eq!(ctx.request_id, request_id);
        }
    }
}

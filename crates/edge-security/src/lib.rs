//! Security infrastructure for the edge request-security pipeline.
//!
//! This crate provides:
//! - `NonceGenerator` - Per-request CSP nonces
//! - `CspConfig` / `build_csp_header` - Content-Security-Policy assembly
//! - `SecurityHeadersConfig` / `generate_security_headers` - HSTS, framing,
//!   referrer and permissions headers
//! - `ContactFormGuard` - Honeypot, timing, validation and rate limiting
//!   for contact-form submissions
//!
//! # Example
//!
//! ```ignore
//! use edge_security::{build_csp_header, generate_nonce, CspConfig};
//!
//! let config = CspConfig::balanced();
//! validate_csp_config(&config)?;
//!
//! let nonce = generate_nonce(None);
//! let csp = build_csp_header(&config, &nonce.nonce);
//! response.insert(csp.header_name, csp.header_value);
//! ```

mod csp;
mod form;
mod headers;
mod nonce;
mod rate_limit;

pub use csp::*;
pub use form::*;
pub use headers::*;
pub use nonce::*;
pub use rate_limit::*;

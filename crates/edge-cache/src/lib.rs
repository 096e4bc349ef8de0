//! Cache-Control policy resolution for the edge request-security pipeline.
//!
//! This crate provides:
//! - `CachePolicy` - The four cache classes and their fixed directives
//! - `CacheControlConfig` - Route patterns per class
//! - `CachePolicyResolver` - Compiled, priority-ordered path classification
//!
//! # Example
//!
//! ```ignore
//! use edge_cache::{CacheControlConfig, CachePolicy, CachePolicyResolver};
//!
//! let resolver = CachePolicyResolver::new(&CacheControlConfig::default())?;
//!
//! assert_eq!(resolver.resolve("/api/subscribe"), CachePolicy::Sensitive);
//! response.insert("Cache-Control", resolver.resolve(path).directive());
//! ```

mod policy;

pub use policy::*;

//! Core abstractions for the edge request-security pipeline.
//!
//! This crate provides the fundamental types shared by every stage:
//! - `RequestContext` - Path and headers of the inbound request
//! - `HeaderSet` - Ordered response headers handed back to the caller
//! - `RoutePattern` / `PatternSet` - Case-insensitive glob route matching
//! - `Clock` - Injectable time source for stateful components
//! - `Environment` - Development / production switch

mod clock;
mod config;
mod context;
mod headers;
mod pattern;

pub use clock::*;
pub use config::*;
pub use context::*;
pub use headers::*;
pub use pattern::*;

//! Fail-open request pipeline.
//!
//! This crate wires the header builders into a per-request pipeline:
//! - `RequestPipeline` - Runs the CSP, Cache-Control and hardening steps
//! - `CircuitBreaker` - Bypasses the pipeline after repeated failures
//! - `isolate` - Runs one step, turning errors and panics into failures
//! - `PipelineConfig` - Environment-driven configuration
//!
//! # Example
//!
//! ```ignore
//! use edge_executor::{PipelineConfig, RequestPipeline};
//!
//! let pipeline = RequestPipeline::new(PipelineConfig::from_env()?)?;
//!
//! let outcome = pipeline.handle("/api/subscribe", &request_headers);
//! for (name, value) in outcome.headers.iter() {
//!     response.insert(name, value);
//! }
//! ```

mod circuit_breaker;
mod config;
mod fallback;
mod pipeline;

pub use circuit_breaker::*;
pub use config::*;
pub use fallback::*;
pub use pipeline::*;

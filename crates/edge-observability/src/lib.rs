//! Observability for the edge request-security pipeline.
//!
//! This crate provides:
//! - `init_logging` - Installs a `tracing` subscriber (human or JSON)
//! - `PipelineMetrics` - Lock-free counters for requests, bypasses and
//!   per-step failures

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;

//! Public SDK for the edge request-security pipeline.
//!
//! This crate re-exports all pipeline functionality:
//!
//! ```ignore
//! use edge_sdk::prelude::*;
//!
//! init_logging(LogFormat::Json, LogLevel::Info)?;
//! let pipeline = Arc::new(RequestPipeline::new(PipelineConfig::from_env()?)?);
//!
//! // per request
//! let outcome = pipeline.handle(&path, &request_headers);
//! let downstream_headers = outcome.forwarded_request_headers(&request_headers);
//! let response = render(downstream_headers)?;
//! for (name, value) in outcome.headers.iter() {
//!     response.headers_mut().insert(name, value);
//! }
//! ```

pub use edge_cache;
pub use edge_core;
pub use edge_executor;
pub use edge_observability;
pub use edge_security;

/// Prelude for convenient imports.
pub mod prelude {
    pub use edge_cache::*;
    pub use edge_core::*;
    pub use edge_executor::*;
    pub use edge_observability::*;
    pub use edge_security::*;
}

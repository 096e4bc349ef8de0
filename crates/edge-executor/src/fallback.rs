//! Step isolation.
//!
//! Each pipeline step runs through [`isolate`]. An `Err` and a panic are
//! both turned into a [`StepFailure`]; the caller drops that step's headers
//! and keeps going.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;

/// Pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// Nonce + Content-Security-Policy.
    Csp,
    /// Cache-Control.
    Cache,
    /// HSTS, framing, referrer and permissions headers.
    Headers,
}

impl Step {
    /// Label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csp => "csp",
            Self::Cache => "cache",
            Self::Headers => "headers",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a header builder at request time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    #[error("builder failed: {0}")]
    Builder(String),

    #[error("invalid header value for {header}: {reason}")]
    InvalidHeader { header: String, reason: String },
}

impl StepError {
    /// Convenience constructor for a generic builder failure.
    pub fn builder(message: impl Into<String>) -> Self {
        Self::Builder(message.into())
    }
}

/// A step that did not produce headers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepFailure {
    #[error("{step} step returned an error: {error}")]
    Error { step: Step, error: StepError },

    #[error("{step} step panicked: {message}")]
    Panic { step: Step, message: String },
}

impl StepFailure {
    /// The step that failed.
    pub fn step(&self) -> Step {
        match self {
            Self::Error { step, .. } | Self::Panic { step, .. } => *step,
        }
    }
}

/// Run one step, converting errors and panics into a [`StepFailure`].
pub fn isolate<T, F>(step: Step, f: F) -> Result<T, StepFailure>
where
    F: FnOnce() -> Result<T, StepError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(StepFailure::Error { step, error }),
        Err(payload) => Err(StepFailure::Panic {
            step,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

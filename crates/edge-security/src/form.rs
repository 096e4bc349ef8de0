//! Contact-form abuse resistance.
//!
//! Checks run in a fixed order and the first failure wins:
//! honeypot, fill timing, field validation, then a per-email rate limit.
//! Only submissions that pass the first three are counted by the limiter.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use edge_core::{Clock, SystemClock};
use serde::{Deserialize, Serialize};

use crate::rate_limit::{RateDecision, RateLimitConfig, SlidingWindowLimiter};

/// Maximum name length after trimming.
pub const MAX_NAME_LEN: usize = 100;
/// Maximum email length.
pub const MAX_EMAIL_LEN: usize = 254;
/// Minimum message length after trimming.
pub const MIN_MESSAGE_LEN: usize = 10;
/// Maximum message length after trimming.
pub const MAX_MESSAGE_LEN: usize = 5000;

/// A raw contact-form submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub message: String,
    /// Hidden field; humans leave it empty.
    #[serde(default)]
    pub honeypot: String,
    /// When the form was rendered to the visitor.
    pub rendered_at: DateTime<Utc>,
    /// When the server received the submission. Never read from the
    /// request body; deserializing stamps the current time.
    #[serde(skip_deserializing, default = "Utc::now")]
    pub submitted_at: DateTime<Utc>,
}

/// A submission that passed every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedSubmission {
    pub name: String,
    /// Trimmed, lower-cased email.
    pub email: String,
    pub message: String,
}

/// Form field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Email,
    Message,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Why a submission was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormRejection {
    #[error("honeypot field was filled")]
    Honeypot,

    #[error("form submitted too quickly")]
    TooFast,

    #[error("invalid submission: {}", format_field_errors(.0))]
    Invalid(Vec<FieldError>),

    #[error("too many submissions, retry in {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },
}

impl FormRejection {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Honeypot => "honeypot",
            Self::TooFast => "too_fast",
            Self::Invalid(_) => "invalid",
            Self::RateLimited { .. } => "rate_limited",
        }
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Guard configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactFormConfig {
    /// Minimum time between render and submit.
    pub min_fill_time: Duration,
    /// Per-email submission limit.
    pub rate_limit: RateLimitConfig,
}

impl Default for ContactFormConfig {
    fn default() -> Self {
        Self {
            min_fill_time: Duration::from_secs(3),
            rate_limit: RateLimitConfig::per_hour(3),
        }
    }
}

/// Applies the contact-form checks.
#[derive(Debug)]
pub struct ContactFormGuard {
    config: ContactFormConfig,
    limiter: SlidingWindowLimiter,
}

impl ContactFormGuard {
    /// Create a guard on the system clock.
    pub fn new(config: ContactFormConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a guard whose limiter reads time from `clock`.
    pub fn with_clock(config: ContactFormConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            limiter: SlidingWindowLimiter::with_clock(config.rate_limit, clock),
            config,
        }
    }

    /// Access the underlying limiter.
    pub fn limiter(&self) -> &SlidingWindowLimiter {
        &self.limiter
    }

    /// Run every check against a submission.
    pub fn check(
        &self,
        submission: &ContactSubmission,
    ) -> Result<ValidatedSubmission, FormRejection> {
        if !submission.honeypot.trim().is_empty() {
            tracing::info!(reason = "honeypot", "Contact submission rejected");
            return Err(FormRejection::Honeypot);
        }

        let elapsed = submission
            .submitted_at
            .signed_duration_since(submission.rendered_at)
            .to_std()
            .ok();
        match elapsed {
            Some(elapsed) if elapsed >= self.config.min_fill_time => {}
            _ => {
                tracing::info!(reason = "too_fast", "Contact submission rejected");
                return Err(FormRejection::TooFast);
            }
        }

        let validated = validate_submission(submission).map_err(FormRejection::Invalid)?;

        let decision = catch_unwind(AssertUnwindSafe(|| self.limiter.check(&validated.email)));
        match decision {
            Ok(RateDecision::Allowed { .. }) => Ok(validated),
            Ok(RateDecision::Limited { retry_after }) => {
                tracing::info!(
                    reason = "rate_limited",
                    retry_after_secs = retry_after.as_secs(),
                    "Contact submission rejected"
                );
                Err(FormRejection::RateLimited { retry_after })
            }
            Err(_) => {
                tracing::warn!("Rate limiter failed, allowing submission");
                Ok(validated)
            }
        }
    }
}

impl Default for ContactFormGuard {
    fn default() -> Self {
        Self::new(ContactFormConfig::default())
    }
}

/// Trim and lower-case an email for use as a rate-limit key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate the fields of a submission, collecting every error.
pub fn validate_submission(
    submission: &ContactSubmission,
) -> Result<ValidatedSubmission, Vec<FieldError>> {
    let mut errors = Vec::new();

    let name = submission.name.trim();
    let name_len = name.chars().count();
    if name_len == 0 {
        errors.push(FieldError::new(Field::Name, "name is required"));
    } else if name_len > MAX_NAME_LEN {
        errors.push(FieldError::new(
            Field::Name,
            format!("name must be at most {} characters", MAX_NAME_LEN),
        ));
    }

    let email = normalize_email(&submission.email);
    if let Err(message) = check_email(&email) {
        errors.push(FieldError::new(Field::Email, message));
    }

    let message = submission.message.trim();
    let message_len = message.chars().count();
    if message_len < MIN_MESSAGE_LEN {
        errors.push(FieldError::new(
            Field::Message,
            format!("message must be at least {} characters", MIN_MESSAGE_LEN),
        ));
    } else if message_len > MAX_MESSAGE_LEN {
        errors.push(FieldError::new(
            Field::Message,
            format!("message must be at most {} characters", MAX_MESSAGE_LEN),
        ));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidatedSubmission {
        name: name.to_string(),
        email,
        message: message.to_string(),
    })
}

fn check_email(email: &str) -> Result<(), &'static str> {
    if email.is_empty() {
        return Err("email is required");
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err("email is too long");
    }
    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err("email must contain exactly one '@'"),
    };
    if local.is_empty() {
        return Err("email local part is empty");
    }
    if email.contains(char::is_whitespace) {
        return Err("email must not contain whitespace");
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err("email domain is invalid");
    }
    Ok(())
}

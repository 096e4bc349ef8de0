//! Per-request header pipeline.
//!
//! Runs the CSP, Cache-Control and hardening steps independently. A step
//! that errors or panics loses only its own headers; the response is never
//! failed by the pipeline. Repeated failures open the circuit breaker, which
//! bypasses header generation entirely until it recovers.

use std::sync::Arc;

use edge_cache::CachePolicyResolver;
use edge_core::{header_names, Clock, HeaderSet, Headers, RequestContext, SystemClock};
use edge_observability::PipelineMetrics;
use edge_security::{
    build_csp_header, generate_security_headers, is_csp_safe_nonce, CspConfig, CspResult,
    NonceContext, NonceGenerator, SecurityHeadersConfig,
};
use serde::Serialize;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::{ConfigError, PipelineConfig};
use crate::fallback::{isolate, Step, StepError, StepFailure};

/// Output of the CSP step.
#[derive(Debug, Clone)]
pub struct CspOutput {
    pub nonce: NonceContext,
    pub csp: CspResult,
}

/// Mints a nonce and renders the CSP header.
pub trait CspStep: Send + Sync {
    fn build(&self, request_id: Option<&str>) -> Result<CspOutput, StepError>;
}

/// Resolves the Cache-Control value for a path.
pub trait CacheStep: Send + Sync {
    fn cache_control(&self, path: &str) -> Result<String, StepError>;
}

/// Produces the hardening headers.
pub trait HeaderStep: Send + Sync {
    fn security_headers(&self) -> Result<HeaderSet, StepError>;
}

/// CSP step over a validated, environment-adjusted config.
#[derive(Debug, Clone)]
pub struct StaticCspStep {
    config: CspConfig,
    generator: NonceGenerator,
}

impl StaticCspStep {
    pub fn new(config: CspConfig) -> Self {
        Self {
            config,
            generator: NonceGenerator::new(),
        }
    }
}

impl CspStep for StaticCspStep {
    fn build(&self, request_id: Option<&str>) -> Result<CspOutput, StepError> {
        let nonce = self.generator.generate(request_id);
        if !is_csp_safe_nonce(&nonce.nonce) {
            return Err(StepError::InvalidHeader {
                header: self.config.header_name().to_string(),
                reason: "nonce contains characters outside the base64 alphabet".to_string(),
            });
        }
        let csp = build_csp_header(&self.config, &nonce.nonce);
        Ok(CspOutput { nonce, csp })
    }
}

/// Cache step over compiled route patterns.
#[derive(Debug, Clone)]
pub struct StaticCacheStep {
    resolver: CachePolicyResolver,
}

impl StaticCacheStep {
    pub fn new(resolver: CachePolicyResolver) -> Self {
        Self { resolver }
    }
}

impl CacheStep for StaticCacheStep {
    fn cache_control(&self, path: &str) -> Result<String, StepError> {
        Ok(self.resolver.cache_control(path).to_string())
    }
}

/// Hardening headers rendered once at load time.
#[derive(Debug, Clone)]
pub struct StaticHeaderStep {
    headers: HeaderSet,
}

impl StaticHeaderStep {
    pub fn new(config: &SecurityHeadersConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            headers: generate_security_headers(config)?,
        })
    }
}

impl HeaderStep for StaticHeaderStep {
    fn security_headers(&self) -> Result<HeaderSet, StepError> {
        Ok(self.headers.clone())
    }
}

/// Result of running the pipeline for one request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineOutcome {
    /// Headers to attach to the response, in emission order.
    pub headers: HeaderSet,
    /// Nonce for the renderer; set only when the CSP step succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<NonceContext>,
    /// The breaker was open and no headers were generated.
    pub bypassed: bool,
    /// Steps that failed and were omitted.
    pub failed_steps: Vec<Step>,
}

impl PipelineOutcome {
    /// Check if any step was omitted.
    pub fn is_degraded(&self) -> bool {
        self.bypassed || !self.failed_steps.is_empty()
    }

    /// Request headers for the downstream renderer.
    ///
    /// Any client-supplied `x-nonce` is dropped; the minted nonce, if any,
    /// takes its place.
    pub fn forwarded_request_headers(&self, request_headers: &Headers) -> Headers {
        let mut forwarded = request_headers.clone();
        forwarded.retain(|name, _| !name.eq_ignore_ascii_case(header_names::X_NONCE));
        if let Some(nonce) = &self.nonce {
            forwarded.insert(header_names::X_NONCE.to_string(), nonce.nonce.clone());
        }
        forwarded
    }
}

/// The request-security pipeline.
///
/// Shared across threads behind an `Arc`; the breaker and metrics are the
/// only mutable state.
pub struct RequestPipeline {
    config: PipelineConfig,
    csp: Box<dyn CspStep>,
    cache: Box<dyn CacheStep>,
    headers: Box<dyn HeaderStep>,
    breaker: CircuitBreaker,
    metrics: Arc<PipelineMetrics>,
}

impl RequestPipeline {
    /// Validate the config and build the default steps.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`RequestPipeline::new`], with the breaker reading time from `clock`.
    pub fn with_clock(config: PipelineConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;

        let csp = StaticCspStep::new(config.effective_csp());
        let cache = StaticCacheStep::new(CachePolicyResolver::new(&config.cache)?);
        let headers = StaticHeaderStep::new(&config.security_headers)?;

        tracing::info!(
            csp_enabled = config.csp_enabled,
            csp_report_only = config.csp_report_only,
            cache_control_enabled = config.cache_control_enabled,
            environment = %config.environment,
            "Request pipeline configured"
        );

        Ok(Self {
            breaker: CircuitBreaker::with_clock(config.breaker, clock),
            config,
            csp: Box::new(csp),
            cache: Box::new(cache),
            headers: Box::new(headers),
            metrics: Arc::new(PipelineMetrics::new()),
        })
    }

    /// Replace the CSP step.
    pub fn with_csp_step(mut self, step: impl CspStep + 'static) -> Self {
        self.csp = Box::new(step);
        self
    }

    /// Replace the Cache-Control step.
    pub fn with_cache_step(mut self, step: impl CacheStep + 'static) -> Self {
        self.cache = Box::new(step);
        self
    }

    /// Replace the hardening-header step.
    pub fn with_header_step(mut self, step: impl HeaderStep + 'static) -> Self {
        self.headers = Box::new(step);
        self
    }

    /// Share a metrics registry with the host.
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Effective configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The circuit breaker.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Pipeline counters.
    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Run the pipeline for a request context.
    pub fn handle_request(&self, request: &RequestContext) -> PipelineOutcome {
        self.handle(&request.path, &request.headers)
    }

    /// Run the pipeline for one request. Never fails.
    pub fn handle(&self, path: &str, request_headers: &Headers) -> PipelineOutcome {
        self.metrics.record_request();

        if self.breaker.is_open() {
            self.metrics.record_bypass();
            tracing::debug!(path, "Circuit breaker open, skipping header pipeline");
            return PipelineOutcome {
                bypassed: true,
                ..Default::default()
            };
        }

        let mut outcome = PipelineOutcome::default();

        if self.config.csp_enabled {
            let request_id = request_id(request_headers);
            match isolate(Step::Csp, || self.csp.build(request_id)) {
                Ok(CspOutput { nonce, csp }) => {
                    outcome.headers.insert(csp.header_name, csp.header_value);
                    outcome.nonce = Some(nonce);
                }
                Err(failure) => self.record_failure(&failure, path, &mut outcome),
            }
        }

        if self.config.cache_control_enabled {
            match isolate(Step::Cache, || self.cache.cache_control(path)) {
                Ok(value) => outcome.headers.insert(header_names::CACHE_CONTROL, value),
                Err(failure) => self.record_failure(&failure, path, &mut outcome),
            }
        }

        match isolate(Step::Headers, || self.headers.security_headers()) {
            Ok(headers) => outcome.headers.extend(headers),
            Err(failure) => self.record_failure(&failure, path, &mut outcome),
        }

        outcome
    }

    fn record_failure(&self, failure: &StepFailure, path: &str, outcome: &mut PipelineOutcome) {
        let step = failure.step();
        outcome.failed_steps.push(step);

        match step {
            Step::Csp => self.metrics.record_csp_failure(),
            Step::Cache => self.metrics.record_cache_failure(),
            Step::Headers => self.metrics.record_header_failure(),
        }

        if self.breaker.record_failure() {
            self.metrics.record_breaker_trip();
        }

        tracing::error!(
            step = step.as_str(),
            path,
            error = %failure,
            error_count = self.breaker.error_count(),
            "Header step failed, continuing without it"
        );
    }
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("config", &self.config)
            .field("breaker", &self.breaker)
            .finish_non_exhaustive()
    }
}

fn request_id(headers: &Headers) -> Option<&str> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(header_names::X_REQUEST_ID))
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

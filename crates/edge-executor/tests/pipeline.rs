//! End-to-end pipeline behaviour: ordering, fail-open, breaker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use edge_cache::CacheControlConfig;
use edge_core::{Environment, HeaderSet, Headers, ManualClock};
use edge_executor::{
    CacheStep, CircuitState, CspOutput, CspStep, HeaderStep, PipelineConfig, RequestPipeline,
    StaticCspStep, Step, StepError,
};
use edge_security::CspConfig;

struct FailingCsp;

impl CspStep for FailingCsp {
    fn build(&self, _request_id: Option<&str>) -> Result<CspOutput, StepError> {
        Err(StepError::builder("directive table unavailable"))
    }
}

struct PanickingCache;

impl CacheStep for PanickingCache {
    fn cache_control(&self, _path: &str) -> Result<String, StepError> {
        panic!("resolver state corrupted")
    }
}

struct FailingHeaders;

impl HeaderStep for FailingHeaders {
    fn security_headers(&self) -> Result<HeaderSet, StepError> {
        Err(StepError::builder("header table unavailable"))
    }
}

/// CSP step that fails until switched off.
struct FlakyCsp {
    failing: Arc<AtomicBool>,
    inner: StaticCspStep,
}

impl CspStep for FlakyCsp {
    fn build(&self, request_id: Option<&str>) -> Result<CspOutput, StepError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StepError::builder("flaky"))
        } else {
            self.inner.build(request_id)
        }
    }
}

fn pipeline() -> (RequestPipeline, ManualClock) {
    let clock = ManualClock::new();
    let pipeline =
        RequestPipeline::with_clock(PipelineConfig::default(), Arc::new(clock.clone())).unwrap();
    (pipeline, clock)
}

fn no_headers() -> Headers {
    Headers::new()
}

#[test]
fn test_full_header_set_in_order() {
    let (pipeline, _clock) = pipeline();

    let outcome = pipeline.handle("/api/subscribe", &no_headers());

    assert!(!outcome.is_degraded());
    assert_eq!(
        outcome.headers.names(),
        vec![
            "Content-Security-Policy",
            "Cache-Control",
            "Strict-Transport-Security",
            "Referrer-Policy",
            "X-Frame-Options",
            "X-Content-Type-Options",
            "X-XSS-Protection",
            "Permissions-Policy",
        ]
    );
    assert_eq!(
        outcome.headers.get("Cache-Control"),
        Some("no-store, no-cache, must-revalidate, max-age=0, private")
    );

    let nonce = outcome.nonce.expect("nonce minted");
    let csp = outcome.headers.get("Content-Security-Policy").unwrap();
    assert!(csp.contains(&format!("script-src 'nonce-{}' 'self'", nonce.nonce)));
    assert!(csp.ends_with("; report-uri /api/csp-report"));
}

#[test]
fn test_runs_are_identical_except_for_nonce() {
    let (pipeline, _clock) = pipeline();

    let a = pipeline.handle("/products/42", &no_headers());
    let b = pipeline.handle("/products/42", &no_headers());

    let nonce_a = a.nonce.unwrap().nonce;
    let nonce_b = b.nonce.unwrap().nonce;
    assert_ne!(nonce_a, nonce_b);

    assert_eq!(a.headers.names(), b.headers.names());
    for (name, value) in a.headers.iter() {
        let other = b.headers.get(name).unwrap();
        assert_eq!(value.replace(&nonce_a, "N"), other.replace(&nonce_b, "N"), "{}", name);
    }
}

#[test]
fn test_request_id_flows_into_nonce() {
    let (pipeline, _clock) = pipeline();
    let mut headers = Headers::new();
    headers.insert("X-Request-ID".to_string(), "req-123".to_string());

    let outcome = pipeline.handle("/", &headers);

    assert_eq!(outcome.nonce.as_ref().unwrap().request_id.as_deref(), Some("req-123"));
    let forwarded = outcome.forwarded_request_headers(&headers);
    assert_eq!(forwarded.get("x-nonce"), Some(&outcome.nonce.unwrap().nonce));
}

#[test]
fn test_csp_failure_keeps_other_headers() {
    let (pipeline, _clock) = pipeline();
    let pipeline = pipeline.with_csp_step(FailingCsp);

    let outcome = pipeline.handle("/_next/static/main.js", &no_headers());

    assert_eq!(outcome.failed_steps, vec![Step::Csp]);
    assert!(outcome.nonce.is_none());
    assert!(!outcome.headers.contains("Content-Security-Policy"));
    assert_eq!(
        outcome.headers.get("Cache-Control"),
        Some("public, max-age=31536000, immutable")
    );
    assert_eq!(outcome.headers.len(), 7);
    assert_eq!(pipeline.breaker().error_count(), 1);
    assert_eq!(pipeline.metrics().snapshot().csp_failures, 1);
    assert!(!outcome.forwarded_request_headers(&no_headers()).contains_key("x-nonce"));
}

#[test]
fn test_panicking_step_is_contained() {
    let (pipeline, _clock) = pipeline();
    let pipeline = pipeline.with_cache_step(PanickingCache);

    let outcome = pipeline.handle("/anything", &no_headers());

    assert_eq!(outcome.failed_steps, vec![Step::Cache]);
    assert!(!outcome.headers.contains("Cache-Control"));
    assert!(outcome.headers.contains("Content-Security-Policy"));
    assert!(outcome.headers.contains("X-Frame-Options"));
    assert_eq!(pipeline.breaker().error_count(), 1);
    assert_eq!(pipeline.metrics().snapshot().cache_failures, 1);
}

#[test]
fn test_every_step_failing_counts_each_once() {
    let (pipeline, _clock) = pipeline();
    let pipeline = pipeline
        .with_csp_step(FailingCsp)
        .with_cache_step(PanickingCache)
        .with_header_step(FailingHeaders);

    let outcome = pipeline.handle("/", &no_headers());

    assert!(outcome.headers.is_empty());
    assert_eq!(outcome.failed_steps, vec![Step::Csp, Step::Cache, Step::Headers]);
    assert_eq!(pipeline.breaker().error_count(), 3);
    assert_eq!(pipeline.metrics().snapshot().total_failures(), 3);
}

#[test]
fn test_breaker_opens_bypasses_and_recovers() {
    let (pipeline, clock) = pipeline();
    let failing = Arc::new(AtomicBool::new(true));
    let pipeline = pipeline.with_csp_step(FlakyCsp {
        failing: Arc::clone(&failing),
        inner: StaticCspStep::new(CspConfig::balanced()),
    });

    for _ in 0..10 {
        let outcome = pipeline.handle("/", &no_headers());
        assert!(!outcome.bypassed);
    }
    assert_eq!(pipeline.breaker().state(), CircuitState::Open);
    assert_eq!(pipeline.metrics().snapshot().breaker_trips, 1);

    let bypassed = pipeline.handle("/api/subscribe", &no_headers());
    assert!(bypassed.bypassed);
    assert!(bypassed.headers.is_empty());
    assert!(bypassed.nonce.is_none());
    assert_eq!(pipeline.metrics().snapshot().bypassed_total, 1);

    clock.advance(Duration::from_secs(300));
    failing.store(false, Ordering::SeqCst);

    let outcome = pipeline.handle("/", &no_headers());
    assert!(!outcome.bypassed);
    assert!(!outcome.is_degraded());
    assert_eq!(pipeline.breaker().state(), CircuitState::Closed);
    assert_eq!(pipeline.breaker().error_count(), 0);
    assert!(outcome.headers.contains("Content-Security-Policy"));
}

#[test]
fn test_slow_failures_never_trip() {
    let (pipeline, clock) = pipeline();
    let pipeline = pipeline.with_csp_step(FailingCsp);

    for _ in 0..30 {
        pipeline.handle("/", &no_headers());
        clock.advance(Duration::from_secs(7));
    }

    assert_eq!(pipeline.breaker().state(), CircuitState::Closed);
    assert_eq!(pipeline.metrics().snapshot().breaker_trips, 0);
}

#[test]
fn test_disabled_steps_emit_nothing() {
    let config = PipelineConfig {
        csp_enabled: false,
        cache_control_enabled: false,
        ..Default::default()
    };
    let pipeline = RequestPipeline::new(config).unwrap();

    let outcome = pipeline.handle("/api/subscribe", &no_headers());

    assert!(outcome.nonce.is_none());
    assert_eq!(outcome.headers.len(), 6);
    assert!(!outcome.headers.contains("Cache-Control"));
}

#[test]
fn test_report_only_in_development() {
    let config = PipelineConfig {
        csp_report_only: true,
        csp_report_uri: None,
        environment: Environment::Development,
        ..Default::default()
    };
    let pipeline = RequestPipeline::new(config).unwrap();

    let outcome = pipeline.handle("/", &no_headers());
    let csp = outcome
        .headers
        .get("Content-Security-Policy-Report-Only")
        .unwrap();

    assert!(!outcome.headers.contains("Content-Security-Policy"));
    assert!(csp.contains("'unsafe-eval'"));
    assert!(!csp.contains("report-uri"));
}

#[test]
fn test_invalid_config_refuses_to_build() {
    let mut config = PipelineConfig::default();
    config.security_headers.hsts.max_age = 3600;
    assert!(RequestPipeline::new(config).is_err());
}

#[test]
fn test_validate_agrees_with_startup() {
    let mut disabled_cache = PipelineConfig::default();
    disabled_cache.cache_control_enabled = false;
    disabled_cache.cache = CacheControlConfig::empty().sensitive("/api/**x");

    let mut disabled_csp = PipelineConfig::default();
    disabled_csp.csp_enabled = false;
    disabled_csp.csp.directives.clear();

    let mut short_hsts = PipelineConfig::default();
    short_hsts.security_headers.hsts.max_age = 3600;

    for config in [PipelineConfig::default(), disabled_cache, disabled_csp, short_hsts] {
        let validated = config.validate().map_err(|e| e.to_string());
        let started = RequestPipeline::new(config).map(|_| ()).map_err(|e| e.to_string());
        assert_eq!(validated, started);
    }
}

#[test]
fn test_shared_across_threads() {
    let (pipeline, _clock) = pipeline();
    let pipeline = Arc::new(pipeline);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let outcome = pipeline.handle(&format!("/page/{}", i), &Headers::new());
                    assert!(outcome.nonce.is_some());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(pipeline.metrics().snapshot().requests_total, 200);
}

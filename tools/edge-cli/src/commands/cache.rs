//! Resolve the cache policy for one path.

use anyhow::Result;
use edge_sdk::edge_cache::CachePolicyResolver;
use edge_sdk::edge_core::normalize_path;
use serde::Serialize;

use super::CacheArgs;
use crate::context::Context;
use crate::output::policy_badge;

#[derive(Serialize)]
struct CacheReport<'a> {
    path: &'a str,
    normalized_path: &'a str,
    policy: edge_sdk::edge_cache::CachePolicy,
    cache_control: &'static str,
    enabled: bool,
}

/// Run the cache command.
pub fn run(args: CacheArgs, ctx: &Context) -> Result<()> {
    let config = ctx.pipeline_config(None)?;
    let resolver = CachePolicyResolver::new(&config.cache)?;
    let policy = resolver.resolve(&args.path);

    let report = CacheReport {
        path: &args.path,
        normalized_path: normalize_path(&args.path),
        policy,
        cache_control: policy.directive(),
        enabled: config.cache_control_enabled,
    };

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    ctx.output.header(&format!("Cache policy for {}", report.path));
    if report.normalized_path != report.path {
        ctx.output.kv("matched as", report.normalized_path);
    }
    ctx.output.kv("policy", &policy_badge(policy));
    ctx.output.kv("Cache-Control", report.cache_control);

    if !report.enabled {
        ctx.output
            .warn("Cache-Control emission is disabled; the pipeline will not send this header");
    }

    Ok(())
}

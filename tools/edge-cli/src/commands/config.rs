//! Configuration inspection commands.

use anyhow::{Context as _, Result};
use edge_sdk::edge_executor::{env_vars, PipelineConfig};
use edge_sdk::edge_security::serialize_directives;

use super::{ConfigArgs, ConfigCommand};
use crate::context::Context;
use crate::output::on_off;

/// Run the config command.
pub fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Validate => validate_config(ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    let config = ctx.pipeline_config(None)?;

    if ctx.output.is_json() {
        ctx.output.json(&config);
        return Ok(());
    }

    ctx.output.header("Effective Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("config file", &path.display().to_string()),
        None => ctx.output.kv("config file", "(none, using environment and defaults)"),
    }

    // Pipeline section
    ctx.output.info("");
    ctx.output.info("[pipeline]");
    ctx.output.kv("environment", config.environment.as_str());
    ctx.output.kv("csp_enabled", &on_off(config.csp_enabled));
    ctx.output.kv("csp_report_only", &on_off(config.csp_report_only));
    ctx.output.kv(
        "csp_report_uri",
        config.csp_report_uri.as_deref().unwrap_or("(disabled)"),
    );
    ctx.output
        .kv("cache_control_enabled", &on_off(config.cache_control_enabled));

    // CSP section
    let csp = config.effective_csp();
    ctx.output.info("");
    ctx.output.info("[csp]");
    ctx.output.kv("header", csp.header_name());
    ctx.output.kv("policy", &serialize_directives(&csp.directives));

    // Cache section
    ctx.output.info("");
    ctx.output.info("[cache]");
    print_routes(ctx, "sensitive", &config.cache.sensitive_routes);
    print_routes(ctx, "auth", &config.cache.auth_routes);
    print_routes(ctx, "public", &config.cache.public_routes);

    // Breaker
    ctx.output.info("");
    ctx.output.info("[breaker]");
    ctx.output
        .kv("threshold", &config.breaker.threshold.to_string());
    ctx.output
        .kv("window", &format!("{}s", config.breaker.window.as_secs()));
    ctx.output
        .kv("recovery", &format!("{}s", config.breaker.recovery.as_secs()));

    Ok(())
}

fn print_routes(ctx: &Context, class: &str, routes: &[String]) {
    ctx.output.kv(class, &format!("{} pattern(s)", routes.len()));
    for route in routes {
        ctx.output.list_item(route);
    }
}

fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let config = ctx.pipeline_config(None)?;
    let warnings = collect_warnings(&config);

    config.validate().context("Configuration is invalid")?;

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if ctx.output.is_json() {
        ctx.output
            .json(&serde_json::json!({ "valid": true, "warnings": warnings }));
        return Ok(());
    }

    if warnings.is_empty() {
        ctx.output.success("Configuration is valid");
    } else {
        ctx.output.success("Configuration is valid (with warnings)");
    }

    Ok(())
}

fn collect_warnings(config: &PipelineConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.csp_enabled {
        warnings.push(format!(
            "CSP is disabled ({}); inline scripts will not be nonce-protected",
            env_vars::CSP_ENABLED
        ));
    }
    if config.csp_enabled && config.csp_report_only {
        warnings.push("CSP is report-only; violations are reported but not blocked".to_string());
    }
    if config.environment.is_development() {
        warnings.push("Development environment widens script-src and style-src".to_string());
    }

    warnings
}

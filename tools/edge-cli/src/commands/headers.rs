//! Run the pipeline for one path.

use anyhow::Result;
use edge_sdk::edge_core::{header_names, RequestContext};
use edge_sdk::edge_executor::RequestPipeline;

use super::HeadersArgs;
use crate::context::Context;

/// Run the headers command.
pub fn run(args: HeadersArgs, ctx: &Context) -> Result<()> {
    let config = ctx.pipeline_config(args.env.as_deref())?;
    let pipeline = RequestPipeline::new(config)?;

    let mut request = RequestContext::new(&args.path);
    if let Some(id) = &args.request_id {
        request = request.with_header(header_names::X_REQUEST_ID, id.clone());
    }
    ctx.output.debug(&format!(
        "Request {} for {}",
        request.request_id,
        request.normalized_path()
    ));

    let outcome = pipeline.handle_request(&request);

    if ctx.output.is_json() {
        ctx.output.json(&outcome);
        return Ok(());
    }

    ctx.output.header(&format!("Response headers for {}", args.path));
    for (name, value) in outcome.headers.iter() {
        ctx.output.kv(name, value);
    }

    if let Some(nonce) = &outcome.nonce {
        ctx.output.header("Nonce");
        ctx.output.kv("value", &nonce.nonce);
        ctx.output.kv("source", &nonce.source_token());
        if let Some(id) = &nonce.request_id {
            ctx.output.kv("request_id", id);
        }
        ctx.output.kv(
            "forwarded as",
            &format!("{}: {}", header_names::X_NONCE, nonce.nonce),
        );
    }

    if outcome.bypassed {
        ctx.output.warn("Circuit breaker open, headers bypassed");
    }
    for step in &outcome.failed_steps {
        ctx.output.warn(&format!("{} step failed, its headers were omitted", step));
    }

    Ok(())
}

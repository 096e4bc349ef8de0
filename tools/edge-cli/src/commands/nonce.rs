//! Mint CSP nonces.

use anyhow::{bail, Result};
use edge_sdk::edge_security::{NonceContext, NonceGenerator};

use super::NonceArgs;
use crate::context::Context;

/// Upper bound on nonces per invocation.
const MAX_COUNT: usize = 10_000;

/// Run the nonce command.
pub fn run(args: NonceArgs, ctx: &Context) -> Result<()> {
    if args.count == 0 || args.count > MAX_COUNT {
        bail!("--count must be between 1 and {}", MAX_COUNT);
    }

    let generator = NonceGenerator::new();
    let nonces: Vec<NonceContext> = (0..args.count).map(|_| generator.generate(None)).collect();

    if ctx.output.is_json() {
        ctx.output.json(&nonces);
        return Ok(());
    }

    for nonce in &nonces {
        println!("{}", nonce.nonce);
    }

    Ok(())
}

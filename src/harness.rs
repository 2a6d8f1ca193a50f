//! Orchestrator: run the three phases in order and summarize.
//!
//! Phases never gate each other. A phase that cannot reach its server reports
//! failed checks and the next phase runs anyway.

use std::sync::Arc;

use crate::client::Connector;
use crate::config::HarnessConfig;
use crate::output::Output;
use crate::phases::{basic_connectivity, credential_sweep, pool_stress, PhaseContext};
use crate::report::Reporter;

pub const TITLE: &str = "wireprobe: MySQL wire conformance";

/// Run every phase against the configured targets.
pub async fn run_all(
    config: &HarnessConfig,
    connector: &dyn Connector,
    reporter: Arc<dyn Reporter>,
    output: &Output,
) {
    let ctx = PhaseContext {
        connector,
        reporter,
        output,
    };

    output.title(TITLE);

    output.section(&format!(
        "Basic connectivity ({})",
        config.basic.target.endpoint
    ));
    let basic = basic_connectivity(&ctx, &config.basic).await;
    if basic.connected {
        output.verbose(&format!(
            "basic: {} queries passed, {} failed",
            basic.queries_passed, basic.queries_failed
        ));
    }

    output.section(&format!("Credentials ({})", config.credentials.endpoint));
    let accepted = credential_sweep(&ctx, &config.credentials).await;
    output.verbose(&format!(
        "credentials: {}/{} accepted",
        accepted,
        config.credentials.users.len()
    ));

    output.section(&format!(
        "Connection pool ({})",
        config.pool.target.endpoint
    ));
    let pool = pool_stress(&ctx, &config.pool).await;
    if pool.timed_out {
        output.verbose("pool: stopped waiting for unfinished tasks");
    }
}

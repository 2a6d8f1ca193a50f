//! Single-connection smoke test: handshake, ping, three scalar queries.

use crate::client::ScalarQuery;
use crate::config::BasicPhaseConfig;
use crate::probe::{probe, ProbeOutcome};

use super::PhaseContext;

pub fn basic_queries() -> Vec<ScalarQuery> {
    vec![
        ScalarQuery::new("SELECT 1", "SELECT 1"),
        ScalarQuery::new("VERSION()", "SELECT VERSION()"),
        ScalarQuery::new("DATABASE()", "SELECT DATABASE()"),
    ]
}

pub async fn basic_connectivity(ctx: &PhaseContext<'_>, config: &BasicPhaseConfig) -> ProbeOutcome {
    ctx.output
        .verbose(&format!("basic: probing {}", config.target.display()));

    probe(
        ctx.connector,
        ctx.reporter.as_ref(),
        "connect",
        &config.target,
        &basic_queries(),
    )
    .await
}

//! Connect once per configured credential and report what the server did.
//!
//! Observational only: no credential is expected to pass or fail.

use crate::config::{Credential, CredentialSweepConfig, Target};
use crate::probe::probe;

use super::PhaseContext;

/// Label for a credential-scoped check.
fn user_label(credential: &Credential) -> String {
    format!("user '{}'", credential.username)
}

/// Returns how many credentials the server accepted.
pub async fn credential_sweep(ctx: &PhaseContext<'_>, config: &CredentialSweepConfig) -> usize {
    let mut accepted = 0;

    for credential in &config.users {
        let target = Target {
            endpoint: config.endpoint.clone(),
            database: config.database.clone(),
            credential: credential.clone(),
        };
        ctx.output
            .verbose(&format!("credentials: probing {}", target.display()));

        let outcome = probe(
            ctx.connector,
            ctx.reporter.as_ref(),
            &user_label(credential),
            &target,
            &[],
        )
        .await;
        if outcome.connected {
            accepted += 1;
        }
    }

    accepted
}

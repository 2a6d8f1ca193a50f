//! Connection probe: connect, ping, run scalar queries, report each step.
//!
//! Every phase is built from this. A probe reports exactly one result for the
//! connection attempt, followed by one result per query only when the
//! connection is alive.

use crate::client::{Connector, ScalarQuery, Session};
use crate::config::Target;
use crate::report::{ProbeResult, Reporter};

/// What a probe observed, for callers that want more than the report lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeOutcome {
    pub connected: bool,
    pub queries_passed: usize,
    pub queries_failed: usize,
}

pub async fn probe(
    connector: &dyn Connector,
    reporter: &dyn Reporter,
    label: &str,
    target: &Target,
    queries: &[ScalarQuery],
) -> ProbeOutcome {
    let mut session = match connector.open(target).await {
        Ok(session) => session,
        Err(e) => {
            tracing::debug!(server = %target.display(), error = %e, "connection failed");
            reporter.report(&ProbeResult::from_error(label, "connection failed", &e));
            return ProbeOutcome::default();
        }
    };

    let outcome = run_session(session.as_mut(), reporter, label, target, queries).await;

    // Released on every path, including a failed ping.
    if let Err(e) = session.close().await {
        tracing::debug!(server = %target.display(), error = %e, "close failed");
    }

    outcome
}

async fn run_session(
    session: &mut dyn Session,
    reporter: &dyn Reporter,
    label: &str,
    target: &Target,
    queries: &[ScalarQuery],
) -> ProbeOutcome {
    let mut outcome = ProbeOutcome::default();

    if let Err(e) = session.ping().await {
        tracing::debug!(server = %target.display(), error = %e, "ping failed");
        reporter.report(&ProbeResult::from_error(label, "ping failed", &e));
        return outcome;
    }

    outcome.connected = true;
    reporter.report(&ProbeResult::pass(label, connected_detail(target, session)));

    for query in queries {
        match session.query_row(&query.sql).await {
            Ok(row) => {
                outcome.queries_passed += 1;
                reporter.report(&ProbeResult::pass(&query.label, row.to_string()));
            }
            Err(e) => {
                outcome.queries_failed += 1;
                reporter.report(&ProbeResult::from_error(&query.label, "query failed", &e));
            }
        }
    }

    outcome
}

fn connected_detail(target: &Target, session: &dyn Session) -> String {
    match session.connection_id() {
        Some(id) => format!("connected to {} (connection id {})", target.display(), id),
        None => format!("connected to {}", target.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{Access, FakeServer};
    use crate::client::ScalarRow;
    use crate::config::{Credential, Endpoint};
    use crate::report::testing::RecordingReporter;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn target(user: &str) -> Target {
        Target {
            endpoint: Endpoint::new("localhost", 3306),
            database: Some("test".into()),
            credential: Credential::new(user, ""),
        }
    }

    fn queries() -> Vec<ScalarQuery> {
        vec![
            ScalarQuery::new("SELECT 1", "SELECT 1"),
            ScalarQuery::new("VERSION()", "SELECT VERSION()"),
        ]
    }

    #[tokio::test]
    async fn test_connect_and_query() {
        let server = Arc::new(
            FakeServer::new()
                .with_user("root", Access::Accept)
                .answering("SELECT 1", ScalarRow::single("1"))
                .answering("SELECT VERSION()", ScalarRow::single("8.0.0-tiny")),
        );
        let reporter = RecordingReporter::new();

        let outcome = probe(&server, &reporter, "connect", &target("root"), &queries()).await;

        assert!(outcome.connected);
        assert_eq!(outcome.queries_passed, 2);
        let results = reporter.results();
        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].detail,
            "connected to root@localhost:3306/test (connection id 1)"
        );
        assert_eq!(results[1], ProbeResult::pass("SELECT 1", "1"));
        assert_eq!(results[2], ProbeResult::pass("VERSION()", "8.0.0-tiny"));
        assert_eq!(server.journal.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_open_failure_reports_once_and_skips_queries() {
        let server = Arc::new(FakeServer::new());
        let reporter = RecordingReporter::new();

        let outcome = probe(&server, &reporter, "connect", &target("nobody"), &queries()).await;

        assert_eq!(outcome, ProbeOutcome::default());
        let results = reporter.results();
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(
            results[0].detail,
            "connection failed: Access denied for user 'nobody'"
        );
        assert!(server.journal.queries().is_empty());
    }

    #[tokio::test]
    async fn test_ping_failure_reports_once_closes_and_skips_queries() {
        let server = Arc::new(
            FakeServer::new()
                .with_user("root", Access::RejectPing("server has gone away".into()))
                .answering("SELECT 1", ScalarRow::single("1")),
        );
        let reporter = RecordingReporter::new();

        let outcome = probe(&server, &reporter, "connect", &target("root"), &queries()).await;

        assert!(!outcome.connected);
        assert_eq!(reporter.results().len(), 1);
        assert_eq!(reporter.failed(), 1);
        assert!(reporter.results()[0].detail.starts_with("ping failed"));
        assert!(server.journal.queries().is_empty());
        assert_eq!(server.journal.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_query_failure_does_not_stop_later_queries() {
        let server = Arc::new(
            FakeServer::new()
                .with_user("root", Access::Accept)
                .failing("SELECT 1", "syntax error")
                .answering("SELECT VERSION()", ScalarRow::single("8.0.0-tiny")),
        );
        let reporter = RecordingReporter::new();

        let outcome = probe(&server, &reporter, "connect", &target("root"), &queries()).await;

        assert_eq!(outcome.queries_failed, 1);
        assert_eq!(outcome.queries_passed, 1);
        let results = reporter.results();
        assert_eq!(results.len(), 3);
        assert!(!results[1].success);
        assert_eq!(results[1].detail, "query failed: syntax error");
        assert!(results[2].success);
        assert_eq!(
            server.journal.queries(),
            vec!["SELECT 1".to_string(), "SELECT VERSION()".to_string()]
        );
    }

    #[tokio::test]
    async fn test_zero_queries_is_connectivity_only() {
        let server = Arc::new(FakeServer::new().with_user("root", Access::Accept));
        let reporter = RecordingReporter::new();

        let outcome = probe(&server, &reporter, "user 'root'", &target("root"), &[]).await;

        assert!(outcome.connected);
        assert_eq!(reporter.labels(), vec!["user 'root'".to_string()]);
        assert_eq!(server.journal.closed.load(Ordering::SeqCst), 1);
    }
}

//! Pool stress: N concurrent `SELECT 1` tasks over one shared pool handle.

use std::sync::Arc;

use crate::client::SharedPool;
use crate::config::{format_duration, PoolStressConfig};
use crate::join::{spawn_all, TaskOutcome};
use crate::report::{ProbeResult, Reporter};

use super::PhaseContext;

const POOL_QUERY: &str = "SELECT 1";

/// Completion signals the phase collected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoolStressOutcome {
    pub outcomes: Vec<TaskOutcome>,
    pub timed_out: bool,
}

impl PoolStressOutcome {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }
}

pub async fn pool_stress(ctx: &PhaseContext<'_>, config: &PoolStressConfig) -> PoolStressOutcome {
    let limits = &config.limits;
    let pool = match ctx.connector.open_pool(&config.target, limits).await {
        Ok(pool) => pool,
        Err(e) => {
            ctx.reporter
                .report(&ProbeResult::from_error("pool", "pool setup failed", &e));
            return PoolStressOutcome::default();
        }
    };

    ctx.output
        .info(&format!("pool: {}", config.target.display()));
    ctx.output.info(&format!(
        "max open connections: {}",
        limits.max_open_connections
    ));
    ctx.output.info(&format!(
        "max idle connections: {}",
        limits.max_idle_connections
    ));
    ctx.output.info(&format!(
        "max connection lifetime: {}",
        format_duration(limits.max_connection_lifetime)
    ));

    let set = spawn_all(config.tasks, |task_id| {
        run_task(task_id, Arc::clone(&pool), Arc::clone(&ctx.reporter))
    });

    let expected = set.expected();
    let outcome = match config.task_timeout {
        None => PoolStressOutcome {
            outcomes: set.wait().await,
            timed_out: false,
        },
        Some(limit) => match set.wait_timeout(limit).await {
            Ok(outcomes) => PoolStressOutcome {
                outcomes,
                timed_out: false,
            },
            Err(timeout) => {
                ctx.reporter.report(&ProbeResult::fail(
                    "pool tasks",
                    format!(
                        "timed out after {} with {}/{} tasks finished",
                        format_duration(timeout.waited),
                        timeout.completed.len(),
                        timeout.expected
                    ),
                ));
                PoolStressOutcome {
                    outcomes: timeout.completed,
                    timed_out: true,
                }
            }
        },
    };

    ctx.output.info(&format!(
        "concurrent queries finished: {}/{} succeeded",
        outcome.succeeded(),
        expected
    ));

    // Detached tasks still hold checked-out connections, and disconnecting
    // the pool waits for those to come back. Only close when all tasks ended.
    if outcome.timed_out {
        tracing::debug!("leaving pool open for detached tasks");
    } else if let Err(e) = pool.close().await {
        tracing::debug!(error = %e, "pool close failed");
    }

    outcome
}

async fn run_task(task_id: usize, pool: Arc<dyn SharedPool>, reporter: Arc<dyn Reporter>) -> bool {
    let label = format!("task {}", task_id);
    match pool.query_row(POOL_QUERY).await {
        Ok(row) => {
            tracing::debug!(task_id, "pooled query succeeded");
            reporter.report(&ProbeResult::pass(label, format!("{} = {}", POOL_QUERY, row)));
            true
        }
        Err(e) => {
            tracing::debug!(task_id, error = %e, "pooled query failed");
            reporter.report(&ProbeResult::from_error(label, "query failed", &e));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::FakeServer;
    use crate::client::ScalarRow;
    use crate::config::PoolConfig;
    use crate::output::Output;
    use crate::report::testing::RecordingReporter;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn sorted_ids(outcome: &PoolStressOutcome) -> Vec<usize> {
        let mut ids: Vec<_> = outcome.outcomes.iter().map(|o| o.task_id).collect();
        ids.sort_unstable();
        ids
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_five_tasks_five_results() {
        let server = Arc::new(FakeServer::new().answering("SELECT 1", ScalarRow::single("1")));
        let reporter = Arc::new(RecordingReporter::new());
        let output = Output::new(true, false);
        let ctx = PhaseContext {
            connector: &server,
            reporter: reporter.clone(),
            output: &output,
        };

        let outcome = pool_stress(&ctx, &PoolStressConfig::default()).await;

        assert!(!outcome.timed_out);
        assert_eq!(sorted_ids(&outcome), vec![0, 1, 2, 3, 4]);
        assert_eq!(outcome.succeeded(), 5);

        let mut labels = reporter.labels();
        labels.sort();
        assert_eq!(labels, vec!["task 0", "task 1", "task 2", "task 3", "task 4"]);
        assert_eq!(reporter.passed(), 5);

        assert_eq!(server.journal.pools_opened.load(Ordering::SeqCst), 1);
        assert_eq!(server.journal.pools_closed.load(Ordering::SeqCst), 1);
        assert_eq!(
            server.journal.pool_limits.lock().unwrap().clone(),
            Some(PoolConfig::default())
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_one_transient_failure() {
        let server = Arc::new(
            FakeServer::new()
                .answering("SELECT 1", ScalarRow::single("1"))
                .failing_pool_call(3),
        );
        let reporter = Arc::new(RecordingReporter::new());
        let output = Output::new(true, false);
        let ctx = PhaseContext {
            connector: &server,
            reporter: reporter.clone(),
            output: &output,
        };

        let outcome = pool_stress(&ctx, &PoolStressConfig::default()).await;

        assert_eq!(outcome.outcomes.len(), 5);
        assert_eq!(sorted_ids(&outcome), vec![0, 1, 2, 3, 4]);
        assert_eq!(outcome.succeeded(), 4);
        assert_eq!(reporter.results().len(), 5);
        assert_eq!(reporter.passed(), 4);
        assert_eq!(reporter.failed(), 1);
        assert_eq!(server.journal.queries().len(), 5);
    }

    #[tokio::test]
    async fn test_pool_setup_failure_reports_once() {
        let server = Arc::new(FakeServer::new().rejecting_pool("invalid pool options"));
        let reporter = Arc::new(RecordingReporter::new());
        let output = Output::new(true, false);
        let ctx = PhaseContext {
            connector: &server,
            reporter: reporter.clone(),
            output: &output,
        };

        let outcome = pool_stress(&ctx, &PoolStressConfig::default()).await;

        assert!(outcome.outcomes.is_empty());
        assert_eq!(reporter.results().len(), 1);
        assert_eq!(
            reporter.results()[0].detail,
            "pool setup failed: invalid pool options"
        );
        assert!(server.journal.queries().is_empty());
    }

    #[tokio::test]
    async fn test_task_count_and_timeout_are_configurable() {
        let server = Arc::new(FakeServer::new().answering("SELECT 1", ScalarRow::single("1")));
        let reporter = Arc::new(RecordingReporter::new());
        let output = Output::new(true, false);
        let ctx = PhaseContext {
            connector: &server,
            reporter: reporter.clone(),
            output: &output,
        };
        let config = PoolStressConfig {
            tasks: 8,
            task_timeout: Some(Duration::from_secs(5)),
            ..PoolStressConfig::default()
        };

        let outcome = pool_stress(&ctx, &config).await;

        assert!(!outcome.timed_out);
        assert_eq!(sorted_ids(&outcome), (0..8).collect::<Vec<_>>());
        assert_eq!(reporter.passed(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hung_task_times_out_without_closing_pool() {
        let server = Arc::new(
            FakeServer::new()
                .answering("SELECT 1", ScalarRow::single("1"))
                .hanging_pool_call(2),
        );
        let reporter = Arc::new(RecordingReporter::new());
        let output = Output::new(true, false);
        let ctx = PhaseContext {
            connector: &server,
            reporter: reporter.clone(),
            output: &output,
        };
        let config = PoolStressConfig {
            task_timeout: Some(Duration::from_millis(200)),
            ..PoolStressConfig::default()
        };

        let outcome = tokio::time::timeout(Duration::from_secs(10), pool_stress(&ctx, &config))
            .await
            .expect("pool phase returned after the task timeout");

        assert!(outcome.timed_out);
        assert_eq!(outcome.outcomes.len(), 4);
        assert_eq!(outcome.succeeded(), 4);

        let timeouts: Vec<_> = reporter
            .results()
            .into_iter()
            .filter(|r| r.label == "pool tasks")
            .collect();
        assert_eq!(timeouts.len(), 1);
        assert!(!timeouts[0].success);
        assert_eq!(
            timeouts[0].detail,
            "timed out after 200ms with 4/5 tasks finished"
        );
        assert_eq!(reporter.passed(), 4);
        assert_eq!(reporter.failed(), 1);
        assert_eq!(server.journal.pools_closed.load(Ordering::SeqCst), 0);
    }
}

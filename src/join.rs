//! Spawn N tasks, then block until N completion signals are drained.
//!
//! Each task reports its own result as a side effect; the barrier only
//! accounts for the task reaching its end. Completion is signalled from a drop
//! guard, so a task that panics still delivers exactly one signal.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

/// Completion signal for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskOutcome {
    pub task_id: usize,
    /// False when the task failed or never reached its end normally.
    pub success: bool,
}

/// The wait was bounded and ran out before every task signalled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTimeout {
    pub expected: usize,
    pub completed: Vec<TaskOutcome>,
    pub waited: Duration,
}

/// Handle on a launched task set.
#[derive(Debug)]
pub struct CompletionSet {
    expected: usize,
    rx: mpsc::Receiver<TaskOutcome>,
}

/// Sends the task's outcome when dropped: on return, or while unwinding.
struct CompletionGuard {
    task_id: usize,
    success: bool,
    tx: mpsc::Sender<TaskOutcome>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        // Capacity equals the task count and each guard sends once, so this
        // never sees a full channel.
        let _ = self.tx.try_send(TaskOutcome {
            task_id: self.task_id,
            success: self.success,
        });
    }
}

/// Launch `count` tasks with ids `0..count`. `task(id)` builds the future for
/// task `id`; it resolves to whether that task succeeded.
pub fn spawn_all<F, Fut>(count: usize, mut task: F) -> CompletionSet
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = bool> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(count.max(1));

    for task_id in 0..count {
        let fut = task(task_id);
        let mut guard = CompletionGuard {
            task_id,
            success: false,
            tx: tx.clone(),
        };
        tokio::spawn(async move {
            guard.success = fut.await;
            drop(guard);
        });
    }

    CompletionSet {
        expected: count,
        rx,
    }
}

impl CompletionSet {
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Block until every task has signalled. Arrival order, not id order.
    pub async fn wait(mut self) -> Vec<TaskOutcome> {
        let mut completed = Vec::with_capacity(self.expected);
        while completed.len() < self.expected {
            match self.rx.recv().await {
                Some(outcome) => completed.push(outcome),
                None => break,
            }
        }
        completed
    }

    /// Like [`wait`](Self::wait) but gives up after `limit`. Tasks still
    /// running are left to finish on their own. A limit too far out to be
    /// represented as a deadline waits without one.
    pub async fn wait_timeout(mut self, limit: Duration) -> Result<Vec<TaskOutcome>, JoinTimeout> {
        let Some(deadline) = tokio::time::Instant::now().checked_add(limit) else {
            return Ok(self.wait().await);
        };
        let mut completed = Vec::with_capacity(self.expected);
        while completed.len() < self.expected {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(outcome)) => completed.push(outcome),
                Ok(None) => break,
                Err(_) => {
                    return Err(JoinTimeout {
                        expected: self.expected,
                        completed,
                        waited: limit,
                    })
                }
            }
        }
        Ok(completed)
    }
}

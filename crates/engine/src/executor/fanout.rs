//! Fan-out coordination for independent sibling operations.
//!
//! A [`FanOut`] spawns one task per sibling, waits for every one of them to
//! settle, and reports either success or the first failure it observed.
//! Later failures are logged and discarded. Siblings are never abandoned: the
//! join only returns once all spawned tasks have completed.

use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::WorkflowError;

/// Group of concurrently running sibling tasks.
pub struct FanOut {
    label: &'static str,
    cancel: CancellationToken,
    tasks: JoinSet<Result<(), WorkflowError>>,
}

impl FanOut {
    /// Start an empty group. Tasks receive a child of `cancel`.
    pub fn new(label: &'static str, cancel: &CancellationToken) -> Self {
        Self {
            label,
            cancel: cancel.child_token(),
            tasks: JoinSet::new(),
        }
    }

    /// Spawn one sibling.
    pub fn spawn<F, Fut>(&mut self, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), WorkflowError>> + Send + 'static,
    {
        self.tasks.spawn(task(self.cancel.clone()));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every sibling, then report the first failure observed.
    ///
    /// An empty group succeeds immediately. A panicking sibling counts as a
    /// failure like any other.
    pub async fn join(mut self) -> Result<(), WorkflowError> {
        let total = self.tasks.len();
        let mut first_error: Option<WorkflowError> = None;
        let mut failed = 0usize;

        while let Some(joined) = self.tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|error| Err(WorkflowError::task_aborted(self.label, error)));
            let Err(error) = outcome else {
                continue;
            };
            failed += 1;
            if first_error.is_none() {
                first_error = Some(error);
            } else {
                warn!(fan_out = self.label, %error, "discarding sibling failure");
            }
        }

        debug!(fan_out = self.label, total, failed, "fan-out settled");
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Run every task in `tasks` concurrently and join them.
pub async fn run_all<I, F, Fut>(label: &'static str, cancel: &CancellationToken, tasks: I) -> Result<(), WorkflowError>
where
    I: IntoIterator<Item = F>,
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<(), WorkflowError>> + Send + 'static,
{
    let mut fan_out = FanOut::new(label, cancel);
    for task in tasks {
        fan_out.spawn(task);
    }
    fan_out.join().await
}

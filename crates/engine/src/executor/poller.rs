//! Job polling.
//!
//! Long-running control-plane operations answer with a job resource. The
//! poller re-fetches the job at its URL until the status is terminal, bounded
//! by an attempt budget and an optional deadline.

use std::sync::Arc;

use foundry_api::Gateway;
use foundry_types::{JobDescriptor, JobStatus, ResourceKind, ResourceRef};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    error::{Step, WorkflowError},
    policy::run_required,
    settings::PollSettings,
};

/// Attempt and deadline accounting shared by polling loops.
#[derive(Debug)]
pub(crate) struct PollBudget {
    settings: PollSettings,
    attempts: u32,
    started: Instant,
}

impl PollBudget {
    pub(crate) fn start(settings: PollSettings) -> Self {
        Self {
            settings,
            attempts: 0,
            started: Instant::now(),
        }
    }

    pub(crate) fn record_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.attempts >= self.settings.max_attempts
            || self
                .settings
                .deadline()
                .is_some_and(|deadline| self.started.elapsed() >= deadline)
    }

    /// Sleep one interval (clamped to the remaining deadline), unless cancelled first.
    pub(crate) async fn pause(&self, cancel: &CancellationToken, step: Step) -> Result<(), WorkflowError> {
        let mut wait = self.settings.interval();
        if let Some(deadline) = self.settings.deadline() {
            wait = wait.min(deadline.saturating_sub(self.started.elapsed()));
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(WorkflowError::Cancelled { step }),
            _ = sleep(wait) => Ok(()),
        }
    }
}

/// Drives a [`JobDescriptor`] to a terminal status.
#[derive(Clone)]
pub struct JobPoller {
    gateway: Arc<dyn Gateway>,
    settings: PollSettings,
}

impl JobPoller {
    pub fn new(gateway: Arc<dyn Gateway>, settings: PollSettings) -> Self {
        Self { gateway, settings }
    }

    /// Wait until `job` finishes.
    ///
    /// A job that is already terminal is resolved without any remote call.
    /// Transport and unexpected-status failures while polling are not retried.
    pub async fn await_completion(&self, mut job: JobDescriptor, cancel: &CancellationToken) -> Result<(), WorkflowError> {
        let resource = ResourceRef::new(ResourceKind::Job, job.guid.clone());
        let mut budget = PollBudget::start(self.settings);

        loop {
            match job.status {
                JobStatus::Finished => {
                    info!(job = %job.guid, attempts = budget.attempts(), "job finished");
                    return Ok(());
                }
                JobStatus::Failed => {
                    warn!(job = %job.guid, attempts = budget.attempts(), "job failed");
                    return Err(WorkflowError::JobFailed {
                        job: job.guid,
                        url: job.url,
                    });
                }
                _ => {}
            }

            if budget.exhausted() {
                warn!(job = %job.guid, attempts = budget.attempts(), status = %job.status, "job polling gave up");
                return Err(WorkflowError::JobTimeout {
                    job: job.guid,
                    attempts: budget.attempts(),
                    status: job.status,
                });
            }

            budget.pause(cancel, Step::PollJob).await?;
            let polled = run_required(cancel, Step::PollJob, &resource, self.gateway.job(&job.url)).await?;
            let attempt = budget.record_attempt();
            job.status = polled.entity.status;
            debug!(job = %job.guid, attempt, status = %job.status, "polled job");
        }
    }
}

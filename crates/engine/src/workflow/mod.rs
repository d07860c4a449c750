//! Compound workflows.
//!
//! Each workflow is a method on [`Orchestrator`] that sequences gateway
//! calls, fans out independent siblings and waits on server-side jobs.
//! Workflows can be awaited inline or started in the background with
//! [`Orchestrator::launch`], which reports through a [`WorkflowHandle`].

use std::{future::Future, sync::Arc, time::Duration};

use foundry_api::Gateway;
use tokio::{sync::oneshot, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{error::WorkflowError, executor::JobPoller, settings::EngineSettings};

mod broker;
mod cleanup;
mod clone;
mod lifecycle;

pub use broker::BrokerAction;
pub use cleanup::{DeletionOutcome, InstanceKind, TeardownReport};
pub use clone::{AppCloneRequest, clone_name};

/// Entry point for all compound workflows.
#[derive(Clone)]
pub struct Orchestrator {
    gateway: Arc<dyn Gateway>,
    settings: EngineSettings,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn Gateway>, settings: EngineSettings) -> Self {
        Self { gateway, settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Poller configured with the job polling settings.
    pub fn job_poller(&self) -> JobPoller {
        JobPoller::new(self.gateway.clone(), self.settings.job_poll)
    }

    /// Run `workflow` on a background task.
    ///
    /// The workflow receives a child of `cancel`. When `deadline` elapses the
    /// child token is cancelled and the workflow reports whatever it observes
    /// at its next suspension point, normally [`WorkflowError::Cancelled`] or
    /// [`WorkflowError::JobTimeout`].
    pub fn launch<T, F, Fut>(&self, cancel: &CancellationToken, deadline: Option<Duration>, workflow: F) -> WorkflowHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(Orchestrator, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, WorkflowError>> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let token = cancel.child_token();
        let future = workflow(self.clone(), token.clone());
        let deadline_token = token.clone();

        tokio::spawn(async move {
            tokio::pin!(future);
            let outcome = match deadline {
                None => future.await,
                Some(deadline) => match timeout(deadline, &mut future).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(deadline_ms = deadline.as_millis() as u64, "workflow deadline elapsed, cancelling");
                        deadline_token.cancel();
                        future.await
                    }
                },
            };
            if sender.send(outcome).is_err() {
                debug!("workflow handle dropped before completion");
            }
        });

        WorkflowHandle { receiver, cancel: token }
    }
}

/// Completion signal of a launched workflow. Resolves exactly once.
pub struct WorkflowHandle<T> {
    receiver: oneshot::Receiver<Result<T, WorkflowError>>,
    cancel: CancellationToken,
}

impl<T> WorkflowHandle<T> {
    /// Request cancellation; the outcome still has to be awaited.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn outcome(self) -> Result<T, WorkflowError> {
        self.receiver.await.unwrap_or_else(|_| {
            Err(WorkflowError::TaskPanicked {
                label: "workflow".to_string(),
                message: "workflow task ended without reporting an outcome".to_string(),
            })
        })
    }
}

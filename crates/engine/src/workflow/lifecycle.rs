//! Application lifecycle: copying bits between apps and starting apps.

use foundry_types::{AppState, AppUpdate, Guid, InstanceState, JobDescriptor, ResourceRef};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Orchestrator;
use crate::{
    error::{Step, WorkflowError},
    executor::PollBudget,
    policy::run_required,
};

impl Orchestrator {
    /// Copy the uploaded bits of `source` onto `target` and wait for the
    /// server-side copy job to finish.
    pub async fn copy_app_bits(&self, source: &Guid, target: &Guid, cancel: &CancellationToken) -> Result<(), WorkflowError> {
        info!(%source, %target, "copying application bits");
        let target_ref = ResourceRef::app(target.clone());
        let job = run_required(cancel, Step::CopyBits, &target_ref, self.gateway.copy_bits(source, target)).await?;
        let job = JobDescriptor::from(job);
        debug!(job = %job.guid, status = %job.status, "copy job accepted");

        self.job_poller().await_completion(job, cancel).await?;
        info!(%source, %target, "application bits copied");
        Ok(())
    }

    /// Set `app` to started and wait until at least one instance runs.
    pub async fn start_application(&self, app: &Guid, cancel: &CancellationToken) -> Result<(), WorkflowError> {
        info!(%app, "starting application");
        let app_ref = ResourceRef::app(app.clone());
        let update = AppUpdate::desired_state(AppState::Started);
        run_required(cancel, Step::StartApp, &app_ref, self.gateway.update_app(app, &update)).await?;

        let mut budget = PollBudget::start(self.settings.start_poll);
        loop {
            let instances = run_required(cancel, Step::FetchInstances, &app_ref, self.gateway.app_instances(app)).await?;
            let attempt = budget.record_attempt();
            let running = instances
                .values()
                .filter(|instance| instance.state == InstanceState::Running)
                .count();
            if running > 0 {
                info!(%app, attempt, running, total = instances.len(), "application started");
                return Ok(());
            }
            debug!(%app, attempt, total = instances.len(), "no running instance yet");

            if budget.exhausted() {
                warn!(%app, attempts = budget.attempts(), "application did not start in time");
                return Err(WorkflowError::StartTimeout {
                    app: app.clone(),
                    attempts: budget.attempts(),
                });
            }
            budget.pause(cancel, Step::FetchInstances).await?;
        }
    }
}

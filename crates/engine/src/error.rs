//! Workflow error taxonomy and the steps errors are attributed to.

use std::fmt;

use foundry_api::GatewayError;
use foundry_types::{Guid, JobStatus, ResourceRef};
use thiserror::Error;
use tokio::task::JoinError;

use crate::policy::AbsencePolicy;

/// A single remote action inside a compound workflow.
///
/// Each step carries the absence policy applied when the gateway reports the
/// addressed resource as missing (see [`Step::absence_policy`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    LoadSourceSummary,
    CreateApp,
    CreateRoute,
    AssociateRoute,
    LoadOwnerSummary,
    CreateServiceInstance,
    FetchInstanceBindings,
    DeleteInstance,
    LoadRoutesForCleanup,
    UnassociateRoute,
    DeleteRoute,
    FetchAppBindings,
    FetchBindingsForTeardown,
    DeleteBinding,
    DeleteApp,
    CopyBits,
    PollJob,
    StartApp,
    FetchInstances,
    FetchServicePlans,
    DeleteServicePlan,
    PurgeService,
    FetchBrokers,
    RegisterBroker,
    UpdateBroker,
}

impl Step {
    /// Stable kebab-case label used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::LoadSourceSummary => "load-source-summary",
            Step::CreateApp => "create-app",
            Step::CreateRoute => "create-route",
            Step::AssociateRoute => "associate-route",
            Step::LoadOwnerSummary => "load-owner-summary",
            Step::CreateServiceInstance => "create-service-instance",
            Step::FetchInstanceBindings => "fetch-instance-bindings",
            Step::DeleteInstance => "delete-instance",
            Step::LoadRoutesForCleanup => "load-routes-for-cleanup",
            Step::UnassociateRoute => "unassociate-route",
            Step::DeleteRoute => "delete-route",
            Step::FetchAppBindings => "fetch-app-bindings",
            Step::FetchBindingsForTeardown => "fetch-bindings-for-teardown",
            Step::DeleteBinding => "delete-binding",
            Step::DeleteApp => "delete-app",
            Step::CopyBits => "copy-bits",
            Step::PollJob => "poll-job",
            Step::StartApp => "start-app",
            Step::FetchInstances => "fetch-instances",
            Step::FetchServicePlans => "fetch-service-plans",
            Step::DeleteServicePlan => "delete-service-plan",
            Step::PurgeService => "purge-service",
            Step::FetchBrokers => "fetch-brokers",
            Step::RegisterBroker => "register-broker",
            Step::UpdateBroker => "update-broker",
        }
    }

    /// Whether a 404 from this step means "already done" or is a failure.
    ///
    /// Reads whose result the workflow depends on are required. Cleanup
    /// operations, and the reads that only exist to find things to clean up,
    /// tolerate absence.
    pub fn absence_policy(&self) -> AbsencePolicy {
        match self {
            Step::FetchInstanceBindings
            | Step::DeleteInstance
            | Step::LoadRoutesForCleanup
            | Step::UnassociateRoute
            | Step::DeleteRoute
            | Step::FetchBindingsForTeardown
            | Step::DeleteBinding
            | Step::DeleteApp
            | Step::FetchServicePlans
            | Step::DeleteServicePlan
            | Step::PurgeService => AbsencePolicy::Tolerated,
            Step::LoadSourceSummary
            | Step::CreateApp
            | Step::CreateRoute
            | Step::AssociateRoute
            | Step::LoadOwnerSummary
            | Step::CreateServiceInstance
            | Step::FetchAppBindings
            | Step::CopyBits
            | Step::PollJob
            | Step::StartApp
            | Step::FetchInstances
            | Step::FetchBrokers
            | Step::RegisterBroker
            | Step::UpdateBroker => AbsencePolicy::Required,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The call never produced a classifiable response (network, decode, link).
    #[error("{step} failed for {resource}: {source}")]
    Gateway {
        step: Step,
        resource: ResourceRef,
        #[source]
        source: GatewayError,
    },

    /// The server answered with a status the step does not accept.
    #[error("{step} for {resource} returned unexpected status {status}: {message}")]
    UnexpectedStatus {
        step: Step,
        resource: ResourceRef,
        status: u16,
        message: String,
    },

    #[error("job {job} failed ({url})")]
    JobFailed { job: Guid, url: String },

    #[error("job {job} did not finish after {attempts} polls (last status: {status})")]
    JobTimeout { job: Guid, attempts: u32, status: JobStatus },

    #[error("app {app} has no route to clone")]
    NoRouteToClone { app: Guid },

    #[error("component {name} ({guid}) is not bound to any app")]
    ComponentNotBound { guid: Guid, name: String },

    #[error("service instance {service} is not listed in the summary of app {app}")]
    ServiceNotInSummary { app: Guid, service: Guid },

    #[error("app {app} has no running instance after {attempts} checks")]
    StartTimeout { app: Guid, attempts: u32 },

    #[error("{step} cancelled")]
    Cancelled { step: Step },

    #[error("{label} task aborted: {message}")]
    TaskPanicked { label: String, message: String },
}

impl WorkflowError {
    /// Attribute a gateway failure to the step and resource that issued it.
    pub fn from_gateway(step: Step, resource: ResourceRef, error: GatewayError) -> Self {
        match error {
            GatewayError::Status { status, message } => Self::UnexpectedStatus {
                step,
                resource,
                status,
                message,
            },
            source => Self::Gateway { step, resource, source },
        }
    }

    pub(crate) fn task_aborted(label: &str, error: JoinError) -> Self {
        let message = if error.is_panic() {
            let payload = error.into_panic();
            payload
                .downcast_ref::<&str>()
                .map(|text| text.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string())
        } else {
            error.to_string()
        };
        Self::TaskPanicked {
            label: label.to_string(),
            message,
        }
    }

    /// The step a failure is attributed to, when it came from a gateway call.
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Gateway { step, .. } | Self::UnexpectedStatus { step, .. } | Self::Cancelled { step } => Some(*step),
            _ => None,
        }
    }

    /// The resource the failing call addressed.
    pub fn resource(&self) -> Option<&ResourceRef> {
        match self {
            Self::Gateway { resource, .. } | Self::UnexpectedStatus { resource, .. } => Some(resource),
            _ => None,
        }
    }

    /// Observed HTTP status of the failing call.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

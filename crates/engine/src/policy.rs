//! Gateway calls issued on behalf of a workflow step.
//!
//! Every call goes through [`run_step`], which races the call against the
//! caller's cancellation token, attributes failures to the issuing step and
//! resource, and applies the step's absence policy to 404 responses.

use std::future::Future;

use foundry_api::GatewayError;
use foundry_types::ResourceRef;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Step, WorkflowError};

/// What a 404 on a step means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsencePolicy {
    /// 404 fails the workflow.
    Required,
    /// 404 counts as success: the resource is already in the desired state.
    Tolerated,
}

/// Issue one gateway call for `step`.
///
/// Returns `Ok(None)` when the step tolerates absence and the resource was
/// missing.
pub(crate) async fn run_step<T, F>(
    cancel: &CancellationToken,
    step: Step,
    resource: &ResourceRef,
    call: F,
) -> Result<Option<T>, WorkflowError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    debug!(%step, %resource, "gateway call");
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(WorkflowError::Cancelled { step }),
        outcome = call => outcome,
    };

    match outcome {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.is_not_found() && step.absence_policy() == AbsencePolicy::Tolerated => {
            debug!(%step, %resource, "resource already absent");
            Ok(None)
        }
        Err(error) => Err(WorkflowError::from_gateway(step, resource.clone(), error)),
    }
}

/// Issue a call whose result the workflow cannot continue without.
pub(crate) async fn run_required<T, F>(cancel: &CancellationToken, step: Step, resource: &ResourceRef, call: F) -> Result<T, WorkflowError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    run_step(cancel, step, resource, call)
        .await?
        .ok_or_else(|| WorkflowError::UnexpectedStatus {
            step,
            resource: resource.clone(),
            status: 404,
            message: format!("{resource} not found"),
        })
}

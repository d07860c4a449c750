//! Cloning applications and service instances into another space.

use foundry_types::{
    App, CloneResult, Component, Guid, Resource, ResourceKind, ResourceRef, Route, ServiceInstanceRequest,
};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::Orchestrator;
use crate::{
    error::{Step, WorkflowError},
    policy::run_required,
};

/// Parameters of the application being created by a clone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppCloneRequest {
    pub name: String,
    pub space: Guid,
    /// Host of the route created for the clone; defaults to the app name.
    pub host: Option<String>,
    pub environment: IndexMap<String, String>,
}

impl AppCloneRequest {
    pub fn new(name: impl Into<String>, space: impl Into<Guid>) -> Self {
        Self {
            name: name.into(),
            space: space.into(),
            ..Default::default()
        }
    }

    fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(&self.name)
    }
}

/// Name given to the clone of `name`.
pub fn clone_name(name: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        name.to_string()
    } else {
        format!("{name}-{suffix}")
    }
}

impl Orchestrator {
    /// Create a copy of `source` in `request.space`, with a new route on the
    /// domain of the source's first route.
    ///
    /// Steps run strictly in order. A failure after the app was created
    /// leaves the partial clone in place.
    pub async fn clone_application(
        &self,
        source: &Guid,
        request: &AppCloneRequest,
        cancel: &CancellationToken,
    ) -> Result<Resource<App>, WorkflowError> {
        info!(source = %source, space = %request.space, name = %request.name, "cloning application");
        let source_ref = ResourceRef::app(source.clone());
        let summary = run_required(cancel, Step::LoadSourceSummary, &source_ref, self.gateway.app_summary(source)).await?;
        let Some(template_route) = summary.routes.first() else {
            return Err(WorkflowError::NoRouteToClone { app: source.clone() });
        };

        let shell = App {
            name: request.name.clone(),
            space_guid: request.space.clone(),
            memory: summary.memory,
            disk_quota: summary.disk_quota,
            instances: summary.instances,
            buildpack: summary.buildpack.clone(),
            environment_json: request.environment.clone(),
            ..Default::default()
        };
        let space_ref = ResourceRef::new(ResourceKind::Space, request.space.clone());
        let created = run_required(cancel, Step::CreateApp, &space_ref, self.gateway.create_app(&shell)).await?;
        let clone_ref = ResourceRef::app(created.guid().clone());

        let route = Route {
            host: request.host().to_string(),
            domain_guid: template_route.domain.guid.clone(),
            space_guid: request.space.clone(),
        };
        let attached = async {
            let route = run_required(cancel, Step::CreateRoute, &clone_ref, self.gateway.create_route(&route)).await?;
            let route_ref = ResourceRef::route(route.guid().clone());
            run_required(
                cancel,
                Step::AssociateRoute,
                &route_ref,
                self.gateway.associate_route(created.guid(), route.guid()),
            )
            .await
        }
        .await;
        if let Err(error) = &attached {
            warn!(clone = %clone_ref, %error, "clone left without a route");
        }
        attached?;

        info!(source = %source, clone = %clone_ref, "application cloned");
        Ok(created)
    }

    /// Create a new instance of `component`'s plan in `space`.
    ///
    /// The plan is recovered from the summary of the first app bound to the
    /// component, so an unbound component cannot be cloned.
    pub async fn clone_service_instance(
        &self,
        space: &Guid,
        parameters: &Map<String, Value>,
        component: &Component,
        suffix: &str,
        cancel: &CancellationToken,
    ) -> Result<CloneResult, WorkflowError> {
        let Some(owner) = component.owner() else {
            return Err(WorkflowError::ComponentNotBound {
                guid: component.guid.clone(),
                name: component.name.clone(),
            });
        };

        let owner_ref = ResourceRef::app(owner.clone());
        let summary = run_required(cancel, Step::LoadOwnerSummary, &owner_ref, self.gateway.app_summary(owner)).await?;
        let Some(service) = summary.service(&component.guid) else {
            return Err(WorkflowError::ServiceNotInSummary {
                app: owner.clone(),
                service: component.guid.clone(),
            });
        };

        let request = ServiceInstanceRequest {
            name: clone_name(&component.name, suffix),
            space_guid: space.clone(),
            service_plan_guid: service.plan.guid.clone(),
            parameters: parameters.clone(),
        };
        let space_ref = ResourceRef::new(ResourceKind::Space, space.clone());
        let created = run_required(
            cancel,
            Step::CreateServiceInstance,
            &space_ref,
            self.gateway.create_service_instance(&request),
        )
        .await?;

        let clone = ResourceRef::new(ResourceKind::ServiceInstance, created.guid().clone());
        info!(original = %component.guid, clone = %clone, plan = %request.service_plan_guid, "service instance cloned");
        Ok(CloneResult {
            component: component.clone(),
            clone,
        })
    }
}

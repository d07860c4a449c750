//! Cleanup workflows: removing routes, bindings, instances, plans and apps.
//!
//! Every delete tolerates the resource already being gone, so these
//! workflows can be re-run after a partial failure.

use foundry_types::{Component, Guid, ResourceKind, ResourceRef};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::Orchestrator;
use crate::{
    error::{Step, WorkflowError},
    executor::FanOut,
    policy::{run_required, run_step},
};

/// What a delete workflow did to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionOutcome {
    Deleted,
    /// Something still depends on the target; nothing was deleted.
    StillBound,
    /// The target did not exist.
    AlreadyAbsent,
}

/// Flavour of service instance addressed by a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceKind {
    Managed,
    UserProvided,
}

impl InstanceKind {
    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            InstanceKind::Managed => ResourceKind::ServiceInstance,
            InstanceKind::UserProvided => ResourceKind::UserProvidedServiceInstance,
        }
    }
}

/// Summary of a tear-down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub app: Guid,
    pub outcome: DeletionOutcome,
}

impl Orchestrator {
    /// Delete a service instance unless something is still bound to it.
    ///
    /// A component with known dependents is left alone without any remote
    /// call. Otherwise the instance's bindings are listed and the instance is
    /// deleted only when there are none.
    pub async fn delete_instance_if_unbound(
        &self,
        component: &Component,
        kind: InstanceKind,
        cancel: &CancellationToken,
    ) -> Result<DeletionOutcome, WorkflowError> {
        if component.is_bound() {
            info!(instance = %component.guid, dependents = component.dependency_of.len(), "instance still referenced, skipping delete");
            return Ok(DeletionOutcome::StillBound);
        }

        let instance = ResourceRef::new(kind.resource_kind(), component.guid.clone());
        let Some(bindings) = run_step(cancel, Step::FetchInstanceBindings, &instance, self.gateway.instance_bindings(&instance)).await?
        else {
            return Ok(DeletionOutcome::AlreadyAbsent);
        };
        if bindings.total_results > 0 || !bindings.is_empty() {
            info!(%instance, bindings = bindings.total_results, "instance still bound, skipping delete");
            return Ok(DeletionOutcome::StillBound);
        }

        let outcome = match run_step(cancel, Step::DeleteInstance, &instance, self.gateway.delete_instance(&instance)).await? {
            Some(()) => DeletionOutcome::Deleted,
            None => DeletionOutcome::AlreadyAbsent,
        };
        info!(%instance, ?outcome, "instance delete finished");
        Ok(outcome)
    }

    /// Detach and delete every route mapped to `app`, all routes concurrently.
    ///
    /// Returns the number of routes processed; an app that no longer exists
    /// has none.
    pub async fn delete_app_routes(&self, app: &Guid, cancel: &CancellationToken) -> Result<usize, WorkflowError> {
        let app_ref = ResourceRef::app(app.clone());
        let Some(summary) = run_step(cancel, Step::LoadRoutesForCleanup, &app_ref, self.gateway.app_summary(app)).await? else {
            info!(%app, "app already gone, no routes to delete");
            return Ok(0);
        };

        let mut fan_out = FanOut::new("delete-app-routes", cancel);
        for route in summary.routes {
            let gateway = self.gateway.clone();
            let app = app.clone();
            fan_out.spawn(move |cancel| async move {
                let route_ref = ResourceRef::route(route.guid.clone());
                run_step(&cancel, Step::UnassociateRoute, &route_ref, gateway.unassociate_route(&app, &route.guid)).await?;
                run_step(&cancel, Step::DeleteRoute, &route_ref, gateway.delete_route(&route.guid)).await?;
                Ok(())
            });
        }

        let count = fan_out.len();
        fan_out.join().await?;
        info!(%app, routes = count, "app routes deleted");
        Ok(count)
    }

    /// Delete every service binding of `app`, all bindings concurrently.
    pub async fn unbind_app_services(&self, app: &Guid, cancel: &CancellationToken) -> Result<usize, WorkflowError> {
        let app_ref = ResourceRef::app(app.clone());
        let bindings = run_required(cancel, Step::FetchAppBindings, &app_ref, self.gateway.app_bindings(app)).await?;
        self.delete_bindings(app, bindings.resources.into_iter().map(|binding| binding.metadata.guid), cancel)
            .await
    }

    async fn delete_bindings(
        &self,
        app: &Guid,
        bindings: impl Iterator<Item = Guid>,
        cancel: &CancellationToken,
    ) -> Result<usize, WorkflowError> {
        let mut fan_out = FanOut::new("unbind-app-services", cancel);
        for binding in bindings {
            let gateway = self.gateway.clone();
            let app = app.clone();
            fan_out.spawn(move |cancel| async move {
                let binding_ref = ResourceRef::new(ResourceKind::ServiceBinding, binding.clone());
                run_step(&cancel, Step::DeleteBinding, &binding_ref, gateway.delete_binding(&app, &binding)).await?;
                Ok(())
            });
        }

        let count = fan_out.len();
        fan_out.join().await?;
        info!(%app, bindings = count, "app services unbound");
        Ok(count)
    }

    /// Remove an application together with its routes and service bindings.
    ///
    /// Routes and bindings are removed concurrently; the app itself is
    /// deleted only once both succeeded.
    pub async fn tear_down_application(&self, app: &Guid, cancel: &CancellationToken) -> Result<TeardownReport, WorkflowError> {
        info!(%app, "tearing down application");
        let mut fan_out = FanOut::new("tear-down-application", cancel);

        let orchestrator = self.clone();
        let routes_app = app.clone();
        fan_out.spawn(move |cancel| async move { orchestrator.delete_app_routes(&routes_app, &cancel).await.map(|_| ()) });

        let orchestrator = self.clone();
        let bindings_app = app.clone();
        fan_out.spawn(move |cancel| async move {
            let app_ref = ResourceRef::app(bindings_app.clone());
            let bindings = run_step(
                &cancel,
                Step::FetchBindingsForTeardown,
                &app_ref,
                orchestrator.gateway.app_bindings(&bindings_app),
            )
            .await?
            .unwrap_or_default();
            orchestrator
                .delete_bindings(&bindings_app, bindings.resources.into_iter().map(|binding| binding.metadata.guid), &cancel)
                .await
                .map(|_| ())
        });

        fan_out.join().await.inspect_err(|error| {
            warn!(%app, %error, "tear-down stopped before deleting the app");
        })?;

        let app_ref = ResourceRef::app(app.clone());
        let outcome = match run_step(cancel, Step::DeleteApp, &app_ref, self.gateway.delete_app(app)).await? {
            Some(()) => DeletionOutcome::Deleted,
            None => DeletionOutcome::AlreadyAbsent,
        };
        info!(%app, ?outcome, "application torn down");
        Ok(TeardownReport { app: app.clone(), outcome })
    }

    /// Delete every plan of `service` and then purge the service itself.
    pub async fn purge_service(&self, service: &Guid, plans_url: &str, cancel: &CancellationToken) -> Result<DeletionOutcome, WorkflowError> {
        let service_ref = ResourceRef::new(ResourceKind::Service, service.clone());
        let Some(plans) = run_step(cancel, Step::FetchServicePlans, &service_ref, self.gateway.service_plans(plans_url)).await? else {
            info!(%service, "service already gone");
            return Ok(DeletionOutcome::AlreadyAbsent);
        };

        let mut fan_out = FanOut::new("delete-service-plans", cancel);
        for plan in plans.resources {
            let gateway = self.gateway.clone();
            let plan = plan.metadata.guid;
            fan_out.spawn(move |cancel| async move {
                let plan_ref = ResourceRef::new(ResourceKind::ServicePlan, plan.clone());
                run_step(&cancel, Step::DeleteServicePlan, &plan_ref, gateway.delete_service_plan(&plan)).await?;
                Ok(())
            });
        }
        fan_out.join().await?;

        let outcome = match run_step(cancel, Step::PurgeService, &service_ref, self.gateway.purge_service(service)).await? {
            Some(()) => DeletionOutcome::Deleted,
            None => DeletionOutcome::AlreadyAbsent,
        };
        info!(%service, ?outcome, "service purged");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use foundry_api::GatewayError;
    use serde_json::{Value, json};

    use super::*;
    use crate::{settings::EngineSettings, testing::ScriptedGateway};

    fn orchestrator(gateway: &Arc<ScriptedGateway>) -> Orchestrator {
        Orchestrator::new(gateway.clone(), EngineSettings::default())
    }

    fn summary_with_routes(routes: &[&str]) -> Value {
        let routes: Vec<Value> = routes
            .iter()
            .map(|guid| json!({ "guid": guid, "host": guid, "domain": { "guid": "d1", "name": "apps.example.com" } }))
            .collect();
        json!({ "guid": "app-1", "name": "orders", "routes": routes })
    }

    fn bindings(guids: &[&str]) -> Value {
        let resources: Vec<Value> = guids
            .iter()
            .map(|guid| json!({ "metadata": { "guid": guid }, "entity": { "app_guid": "app-1", "service_instance_guid": "svc-1" } }))
            .collect();
        json!({ "total_results": guids.len(), "resources": resources })
    }

    #[tokio::test]
    async fn bound_component_is_never_deleted() {
        let gateway = Arc::new(ScriptedGateway::new());
        let component = Component::new("svc-1", "orders-db").with_dependents(["app-1"]);

        let outcome = orchestrator(&gateway)
            .delete_instance_if_unbound(&component, InstanceKind::Managed, &CancellationToken::new())
            .await
            .expect("skipped");

        assert_eq!(outcome, DeletionOutcome::StillBound);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn instance_with_live_bindings_is_kept() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.ok("GET /v2/service_instances/svc-1/service_bindings", bindings(&["b1"]));

        let outcome = orchestrator(&gateway)
            .delete_instance_if_unbound(&Component::new("svc-1", "orders-db"), InstanceKind::Managed, &CancellationToken::new())
            .await
            .expect("kept");

        assert_eq!(outcome, DeletionOutcome::StillBound);
        assert_eq!(gateway.count("DELETE /v2/service_instances/svc-1"), 0);
    }

    #[tokio::test]
    async fn unbound_user_provided_instance_is_deleted() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway
            .ok("GET /v2/user_provided_service_instances/ups-1/service_bindings", bindings(&[]))
            .ok_empty("DELETE /v2/user_provided_service_instances/ups-1");

        let outcome = orchestrator(&gateway)
            .delete_instance_if_unbound(&Component::new("ups-1", "creds"), InstanceKind::UserProvided, &CancellationToken::new())
            .await
            .expect("deleted");

        assert_eq!(outcome, DeletionOutcome::Deleted);
    }

    #[tokio::test]
    async fn missing_instance_counts_as_deleted() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway
            .ok("GET /v2/service_instances/svc-1/service_bindings", bindings(&[]))
            .not_found("DELETE /v2/service_instances/svc-1");

        let outcome = orchestrator(&gateway)
            .delete_instance_if_unbound(&Component::new("svc-1", "orders-db"), InstanceKind::Managed, &CancellationToken::new())
            .await
            .expect("absent is fine");
        assert_eq!(outcome, DeletionOutcome::AlreadyAbsent);

        let gateway = Arc::new(ScriptedGateway::new());
        gateway.not_found("GET /v2/service_instances/svc-1/service_bindings");
        let outcome = orchestrator(&gateway)
            .delete_instance_if_unbound(&Component::new("svc-1", "orders-db"), InstanceKind::Managed, &CancellationToken::new())
            .await
            .expect("absent is fine");
        assert_eq!(outcome, DeletionOutcome::AlreadyAbsent);
        assert_eq!(gateway.count("DELETE /v2/service_instances/svc-1"), 0);
    }

    #[tokio::test]
    async fn deletes_every_route_of_the_app() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway
            .ok("GET /v2/apps/app-1/summary", summary_with_routes(&["r1", "r2"]))
            .ok_empty("DELETE /v2/apps/app-1/routes/r1")
            .ok_empty("DELETE /v2/apps/app-1/routes/r2")
            .ok_empty("DELETE /v2/routes/r1")
            .not_found("DELETE /v2/routes/r2");

        let count = orchestrator(&gateway)
            .delete_app_routes(&Guid::from("app-1"), &CancellationToken::new())
            .await
            .expect("routes deleted");

        assert_eq!(count, 2);
        assert_eq!(gateway.count("DELETE /v2/routes/r1"), 1);
        assert_eq!(gateway.count("DELETE /v2/routes/r2"), 1);
    }

    #[tokio::test]
    async fn missing_app_has_no_routes_to_delete() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.not_found("GET /v2/apps/app-1/summary");

        let count = orchestrator(&gateway)
            .delete_app_routes(&Guid::from("app-1"), &CancellationToken::new())
            .await
            .expect("no-op");
        assert_eq!(count, 0);
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn app_summary_without_routes_issues_no_deletes() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.ok("GET /v2/apps/app-1/summary", summary_with_routes(&[]));

        let count = orchestrator(&gateway)
            .delete_app_routes(&Guid::from("app-1"), &CancellationToken::new())
            .await
            .expect("nothing to do");
        assert_eq!(count, 0);
        assert_eq!(gateway.calls(), vec!["GET /v2/apps/app-1/summary"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_route_is_reported_after_all_routes_settle() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway
            .ok("GET /v2/apps/app-1/summary", summary_with_routes(&["r1", "r2"]))
            .ok_empty("DELETE /v2/apps/app-1/routes/r1")
            .ok_empty("DELETE /v2/routes/r1")
            .delay("DELETE /v2/routes/r1", Duration::from_millis(200))
            .ok_empty("DELETE /v2/apps/app-1/routes/r2")
            .fail("DELETE /v2/routes/r2", GatewayError::status(500, "boom"));

        let error = orchestrator(&gateway)
            .delete_app_routes(&Guid::from("app-1"), &CancellationToken::new())
            .await
            .expect_err("r2 failed");

        assert_eq!(error.resource(), Some(&ResourceRef::route("r2")));
        assert_eq!(error.step(), Some(Step::DeleteRoute));
        assert_eq!(error.status(), Some(500));
        assert!(gateway.completed().contains(&"DELETE /v2/routes/r1".to_string()));
        assert_eq!(gateway.count("DELETE /v2/routes/r2"), 1);
    }

    #[tokio::test]
    async fn unbinds_every_service() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway
            .ok("GET /v2/apps/app-1/service_bindings", bindings(&["b1", "b2"]))
            .ok_empty("DELETE /v2/apps/app-1/service_bindings/b1")
            .not_found("DELETE /v2/apps/app-1/service_bindings/b2");

        let count = orchestrator(&gateway)
            .unbind_app_services(&Guid::from("app-1"), &CancellationToken::new())
            .await
            .expect("unbound");
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn unbind_requires_the_binding_list() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.not_found("GET /v2/apps/app-1/service_bindings");

        let error = orchestrator(&gateway)
            .unbind_app_services(&Guid::from("app-1"), &CancellationToken::new())
            .await
            .expect_err("bindings are required");
        assert_eq!(error.step(), Some(Step::FetchAppBindings));
        assert_eq!(error.status(), Some(404));
    }

    #[tokio::test]
    async fn tear_down_removes_routes_bindings_then_app() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway
            .ok("GET /v2/apps/app-1/summary", summary_with_routes(&["r1"]))
            .ok_empty("DELETE /v2/apps/app-1/routes/r1")
            .ok_empty("DELETE /v2/routes/r1")
            .ok("GET /v2/apps/app-1/service_bindings", bindings(&["b1"]))
            .ok_empty("DELETE /v2/apps/app-1/service_bindings/b1")
            .ok_empty("DELETE /v2/apps/app-1");

        let report = orchestrator(&gateway)
            .tear_down_application(&Guid::from("app-1"), &CancellationToken::new())
            .await
            .expect("torn down");

        assert_eq!(report.outcome, DeletionOutcome::Deleted);
        let calls = gateway.calls();
        assert_eq!(calls.last().map(String::as_str), Some("DELETE /v2/apps/app-1"));
        assert_eq!(calls.len(), 6);
    }

    #[tokio::test]
    async fn tear_down_of_missing_app_succeeds() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway
            .not_found("GET /v2/apps/app-1/summary")
            .not_found("GET /v2/apps/app-1/service_bindings")
            .not_found("DELETE /v2/apps/app-1");

        let report = orchestrator(&gateway)
            .tear_down_application(&Guid::from("app-1"), &CancellationToken::new())
            .await
            .expect("nothing left");
        assert_eq!(report.outcome, DeletionOutcome::AlreadyAbsent);
    }

    #[tokio::test]
    async fn tear_down_keeps_app_when_cleanup_fails() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway
            .ok("GET /v2/apps/app-1/summary", summary_with_routes(&[]))
            .fail("GET /v2/apps/app-1/service_bindings", GatewayError::transport("connection reset"));

        let error = orchestrator(&gateway)
            .tear_down_application(&Guid::from("app-1"), &CancellationToken::new())
            .await
            .expect_err("bindings failed");
        assert!(matches!(error, WorkflowError::Gateway { step: Step::FetchBindingsForTeardown, .. }));
        assert_eq!(gateway.count("DELETE /v2/apps/app-1"), 0);
    }

    #[tokio::test]
    async fn purges_plans_then_service() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway
            .ok(
                "GET /v2/services/svc/service_plans",
                json!({ "total_results": 2, "resources": [
                    { "metadata": { "guid": "p1" }, "entity": { "name": "small", "service_guid": "svc" } },
                    { "metadata": { "guid": "p2" }, "entity": { "name": "large", "service_guid": "svc" } }
                ] }),
            )
            .ok_empty("DELETE /v2/service_plans/p1")
            .ok_empty("DELETE /v2/service_plans/p2")
            .ok_empty("DELETE /v2/services/svc");

        let outcome = orchestrator(&gateway)
            .purge_service(&Guid::from("svc"), "/v2/services/svc/service_plans", &CancellationToken::new())
            .await
            .expect("purged");

        assert_eq!(outcome, DeletionOutcome::Deleted);
        assert_eq!(gateway.calls().last().map(String::as_str), Some("DELETE /v2/services/svc"));
    }

    #[tokio::test]
    async fn purge_of_missing_service_is_a_no_op() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.not_found("GET /v2/services/svc/service_plans");

        let outcome = orchestrator(&gateway)
            .purge_service(&Guid::from("svc"), "/v2/services/svc/service_plans", &CancellationToken::new())
            .await
            .expect("no-op");
        assert_eq!(outcome, DeletionOutcome::AlreadyAbsent);
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn rejected_plan_listing_fails_the_purge() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.fail("GET /v2/services/svc/service_plans", GatewayError::status(400, "bad request"));

        let error = orchestrator(&gateway)
            .purge_service(&Guid::from("svc"), "/v2/services/svc/service_plans", &CancellationToken::new())
            .await
            .expect_err("rejected");
        assert_eq!(error.status(), Some(400));
        assert_eq!(gateway.count("DELETE /v2/services/svc"), 0);
    }
}

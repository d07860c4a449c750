//! Scripted in-memory gateway for workflow tests.
//!
//! Responses are keyed by `"<METHOD> <path>"`, the request the real client
//! would issue. Each key holds a queue of responses; the last one repeats.
//! Unscripted calls answer 500.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use foundry_api::{Gateway, GatewayError};
use foundry_types::{
    App, AppInstance, AppSummary, AppUpdate, BrokerRegistration, Guid, Job, Resource, ResourceList, ResourceRef, Route, ServiceBinding,
    ServiceBroker, ServiceInstance, ServiceInstanceRequest, ServicePlan,
};
use indexmap::IndexMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

type Scripted = Result<Value, GatewayError>;

#[derive(Default)]
pub(crate) struct ScriptedGateway {
    responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    bodies: Mutex<Vec<(String, Value)>>,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond_with(&self, call: impl Into<String>, response: Scripted) -> &Self {
        self.responses
            .lock()
            .expect("responses lock")
            .entry(call.into())
            .or_default()
            .push_back(response);
        self
    }

    pub(crate) fn ok(&self, call: impl Into<String>, body: Value) -> &Self {
        self.respond_with(call, Ok(body))
    }

    pub(crate) fn ok_empty(&self, call: impl Into<String>) -> &Self {
        self.respond_with(call, Ok(Value::Null))
    }

    pub(crate) fn fail(&self, call: impl Into<String>, error: GatewayError) -> &Self {
        self.respond_with(call, Err(error))
    }

    pub(crate) fn not_found(&self, call: impl Into<String>) -> &Self {
        self.fail(call, GatewayError::not_found("not found"))
    }

    /// Delay every answer to `call` by `delay`.
    pub(crate) fn delay(&self, call: impl Into<String>, delay: Duration) -> &Self {
        self.delays.lock().expect("delays lock").insert(call.into(), delay);
        self
    }

    /// Calls in the order they were issued.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Calls in the order they were answered.
    pub(crate) fn completed(&self) -> Vec<String> {
        self.completed.lock().expect("completed lock").clone()
    }

    pub(crate) fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|issued| issued.as_str() == call).count()
    }

    /// Request bodies sent with `call`.
    pub(crate) fn bodies(&self, call: &str) -> Vec<Value> {
        self.bodies
            .lock()
            .expect("bodies lock")
            .iter()
            .filter(|(issued, _)| issued == call)
            .map(|(_, body)| body.clone())
            .collect()
    }

    fn record_body(&self, call: &str, body: &impl Serialize) {
        let body = serde_json::to_value(body).expect("serializable body");
        self.bodies.lock().expect("bodies lock").push((call.to_string(), body));
    }

    async fn answer<T: DeserializeOwned>(&self, call: String) -> Result<T, GatewayError> {
        self.calls.lock().expect("calls lock").push(call.clone());
        let delay = self.delays.lock().expect("delays lock").get(&call).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = {
            let mut responses = self.responses.lock().expect("responses lock");
            match responses.get_mut(&call) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        self.completed.lock().expect("completed lock").push(call.clone());

        match scripted {
            Some(Ok(value)) => serde_json::from_value(value).map_err(|error| GatewayError::decode(call, error.to_string())),
            Some(Err(error)) => Err(error),
            None => Err(GatewayError::status(500, format!("unscripted call: {call}"))),
        }
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn app_summary(&self, app: &Guid) -> Result<AppSummary, GatewayError> {
        self.answer(format!("GET /v2/apps/{app}/summary")).await
    }

    async fn create_app(&self, app: &App) -> Result<Resource<App>, GatewayError> {
        self.record_body("POST /v2/apps", app);
        self.answer("POST /v2/apps".to_string()).await
    }

    async fn update_app(&self, app: &Guid, update: &AppUpdate) -> Result<(), GatewayError> {
        let call = format!("PUT /v2/apps/{app}");
        self.record_body(&call, update);
        self.answer(call).await
    }

    async fn delete_app(&self, app: &Guid) -> Result<(), GatewayError> {
        self.answer(format!("DELETE /v2/apps/{app}")).await
    }

    async fn app_instances(&self, app: &Guid) -> Result<IndexMap<String, AppInstance>, GatewayError> {
        self.answer(format!("GET /v2/apps/{app}/instances")).await
    }

    async fn create_route(&self, route: &Route) -> Result<Resource<Route>, GatewayError> {
        self.record_body("POST /v2/routes", route);
        self.answer("POST /v2/routes".to_string()).await
    }

    async fn associate_route(&self, app: &Guid, route: &Guid) -> Result<(), GatewayError> {
        self.answer(format!("PUT /v2/apps/{app}/routes/{route}")).await
    }

    async fn unassociate_route(&self, app: &Guid, route: &Guid) -> Result<(), GatewayError> {
        self.answer(format!("DELETE /v2/apps/{app}/routes/{route}")).await
    }

    async fn delete_route(&self, route: &Guid) -> Result<(), GatewayError> {
        self.answer(format!("DELETE /v2/routes/{route}")).await
    }

    async fn app_bindings(&self, app: &Guid) -> Result<ResourceList<ServiceBinding>, GatewayError> {
        self.answer(format!("GET /v2/apps/{app}/service_bindings")).await
    }

    async fn delete_binding(&self, app: &Guid, binding: &Guid) -> Result<(), GatewayError> {
        self.answer(format!("DELETE /v2/apps/{app}/service_bindings/{binding}")).await
    }

    async fn instance_bindings(&self, instance: &ResourceRef) -> Result<ResourceList<ServiceBinding>, GatewayError> {
        self.answer(format!("GET {}/service_bindings", instance.path())).await
    }

    async fn delete_instance(&self, instance: &ResourceRef) -> Result<(), GatewayError> {
        self.answer(format!("DELETE {}", instance.path())).await
    }

    async fn create_service_instance(&self, request: &ServiceInstanceRequest) -> Result<Resource<ServiceInstance>, GatewayError> {
        self.record_body("POST /v2/service_instances", request);
        self.answer("POST /v2/service_instances".to_string()).await
    }

    async fn copy_bits(&self, source: &Guid, target: &Guid) -> Result<Resource<Job>, GatewayError> {
        let call = format!("POST /v2/apps/{target}/copy_bits");
        self.record_body(&call, &serde_json::json!({ "source_app_guid": source }));
        self.answer(call).await
    }

    async fn job(&self, url: &str) -> Result<Resource<Job>, GatewayError> {
        self.answer(format!("GET {url}")).await
    }

    async fn service_plans(&self, plans_url: &str) -> Result<ResourceList<ServicePlan>, GatewayError> {
        self.answer(format!("GET {plans_url}")).await
    }

    async fn delete_service_plan(&self, plan: &Guid) -> Result<(), GatewayError> {
        self.answer(format!("DELETE /v2/service_plans/{plan}")).await
    }

    async fn purge_service(&self, service: &Guid) -> Result<(), GatewayError> {
        self.answer(format!("DELETE /v2/services/{service}")).await
    }

    async fn brokers_named(&self, name: &str) -> Result<ResourceList<ServiceBroker>, GatewayError> {
        self.answer(format!("GET /v2/service_brokers?q=name:{name}")).await
    }

    async fn register_broker(&self, registration: &BrokerRegistration) -> Result<(), GatewayError> {
        self.record_body("POST /v2/service_brokers", registration);
        self.answer("POST /v2/service_brokers".to_string()).await
    }

    async fn update_broker(&self, broker: &Guid, registration: &BrokerRegistration) -> Result<(), GatewayError> {
        let call = format!("PUT /v2/service_brokers/{broker}");
        self.record_body(&call, registration);
        self.answer(call).await
    }
}

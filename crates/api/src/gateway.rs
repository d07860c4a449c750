//! The single-resource operations consumed by the orchestration engine.

use async_trait::async_trait;
use foundry_types::{
    App, AppInstance, AppSummary, AppUpdate, BrokerRegistration, Guid, Job, Resource, ResourceList, ResourceRef, Route, ServiceBinding,
    ServiceBroker, ServiceInstance, ServiceInstanceRequest, ServicePlan,
};
use indexmap::IndexMap;

use crate::error::GatewayError;

/// One remote call per resource action.
///
/// Implementations must be safe for concurrent use: the engine issues calls
/// from several tasks at once when it fans out sibling operations. A 404 is
/// always reported as [`GatewayError::Status`]; whether that means "already
/// gone" is decided by the caller.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// `GET /v2/apps/<app>/summary`
    async fn app_summary(&self, app: &Guid) -> Result<AppSummary, GatewayError>;

    /// `POST /v2/apps`
    async fn create_app(&self, app: &App) -> Result<Resource<App>, GatewayError>;

    /// `PUT /v2/apps/<app>`
    async fn update_app(&self, app: &Guid, update: &AppUpdate) -> Result<(), GatewayError>;

    /// `DELETE /v2/apps/<app>`
    async fn delete_app(&self, app: &Guid) -> Result<(), GatewayError>;

    /// `GET /v2/apps/<app>/instances`
    async fn app_instances(&self, app: &Guid) -> Result<IndexMap<String, AppInstance>, GatewayError>;

    /// `POST /v2/routes`
    async fn create_route(&self, route: &Route) -> Result<Resource<Route>, GatewayError>;

    /// `PUT /v2/apps/<app>/routes/<route>`
    async fn associate_route(&self, app: &Guid, route: &Guid) -> Result<(), GatewayError>;

    /// `DELETE /v2/apps/<app>/routes/<route>`
    async fn unassociate_route(&self, app: &Guid, route: &Guid) -> Result<(), GatewayError>;

    /// `DELETE /v2/routes/<route>`
    async fn delete_route(&self, route: &Guid) -> Result<(), GatewayError>;

    /// `GET /v2/apps/<app>/service_bindings`
    async fn app_bindings(&self, app: &Guid) -> Result<ResourceList<ServiceBinding>, GatewayError>;

    /// `DELETE /v2/apps/<app>/service_bindings/<binding>`
    async fn delete_binding(&self, app: &Guid, binding: &Guid) -> Result<(), GatewayError>;

    /// `GET /v2/<instance collection>/<guid>/service_bindings`
    async fn instance_bindings(&self, instance: &ResourceRef) -> Result<ResourceList<ServiceBinding>, GatewayError>;

    /// `DELETE /v2/<instance collection>/<guid>`
    async fn delete_instance(&self, instance: &ResourceRef) -> Result<(), GatewayError>;

    /// `POST /v2/service_instances?accepts_incomplete=false`
    async fn create_service_instance(&self, request: &ServiceInstanceRequest) -> Result<Resource<ServiceInstance>, GatewayError>;

    /// `POST /v2/apps/<target>/copy_bits`
    async fn copy_bits(&self, source: &Guid, target: &Guid) -> Result<Resource<Job>, GatewayError>;

    /// `GET <job url>`
    async fn job(&self, url: &str) -> Result<Resource<Job>, GatewayError>;

    /// `GET <plans url>`
    async fn service_plans(&self, plans_url: &str) -> Result<ResourceList<ServicePlan>, GatewayError>;

    /// `DELETE /v2/service_plans/<plan>`
    async fn delete_service_plan(&self, plan: &Guid) -> Result<(), GatewayError>;

    /// `DELETE /v2/services/<service>?purge=true`
    async fn purge_service(&self, service: &Guid) -> Result<(), GatewayError>;

    /// `GET /v2/service_brokers?q=name:<name>`
    async fn brokers_named(&self, name: &str) -> Result<ResourceList<ServiceBroker>, GatewayError>;

    /// `POST /v2/service_brokers`
    async fn register_broker(&self, registration: &BrokerRegistration) -> Result<(), GatewayError>;

    /// `PUT /v2/service_brokers/<broker>`
    async fn update_broker(&self, broker: &Guid, registration: &BrokerRegistration) -> Result<(), GatewayError>;
}

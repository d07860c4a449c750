//! Entity payloads for applications, routes, services and brokers.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Guid;

/// Desired state of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppState {
    #[default]
    Stopped,
    Started,
}

/// Application entity as accepted by `POST /v2/apps` and returned inside
/// application resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub name: String,
    #[serde(default)]
    pub space_guid: Guid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<AppState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_quota: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buildpack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_guid: Option<Guid>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub environment_json: IndexMap<String, String>,
}

/// Partial update body for `PUT /v2/apps/<guid>`; unset fields are left
/// untouched by the control plane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<AppState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
}

impl AppUpdate {
    pub fn desired_state(state: AppState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }
}

/// Body of `POST /v2/apps/<guid>/copy_bits`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyBitsRequest {
    pub source_app_guid: Guid,
}

/// Summary document of an application (`GET /v2/apps/<guid>/summary`),
/// including the routes mapped to it and the services bound to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSummary {
    pub guid: Guid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub space_guid: Guid,
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub disk_quota: Option<u64>,
    #[serde(default)]
    pub instances: Option<u32>,
    #[serde(default)]
    pub buildpack: Option<String>,
    #[serde(default)]
    pub routes: Vec<SummaryRoute>,
    #[serde(default)]
    pub services: Vec<SummaryService>,
}

impl AppSummary {
    /// Locate a bound service instance by GUID.
    pub fn service(&self, guid: &Guid) -> Option<&SummaryService> {
        self.services.iter().find(|service| &service.guid == guid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryRoute {
    pub guid: Guid,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub domain: Domain,
}

impl fmt::Display for SummaryRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.is_empty() {
            f.write_str(&self.domain.name)
        } else {
            write!(f, "{}.{}", self.host, self.domain.name)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(default)]
    pub guid: Guid,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryService {
    pub guid: Guid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub plan: SummaryPlan,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryPlan {
    #[serde(default)]
    pub guid: Guid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub service: SummaryServiceOffering,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryServiceOffering {
    #[serde(default)]
    pub guid: Guid,
    #[serde(default)]
    pub label: String,
}

/// Route entity for `POST /v2/routes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub host: String,
    pub domain_guid: Guid,
    pub space_guid: Guid,
}

/// Service binding entity joining an app to a service instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceBinding {
    #[serde(default)]
    pub app_guid: Guid,
    #[serde(default)]
    pub service_instance_guid: Guid,
}

/// Body of `POST /v2/service_instances`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstanceRequest {
    pub name: String,
    pub space_guid: Guid,
    pub service_plan_guid: Guid,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

/// Service instance entity returned by the create call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub space_guid: Guid,
    #[serde(default)]
    pub service_plan_guid: Guid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServicePlan {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub service_guid: Guid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceBroker {
    pub name: String,
    #[serde(default)]
    pub broker_url: String,
    #[serde(default)]
    pub auth_username: String,
}

/// Body used to register or update a service broker.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerRegistration {
    pub name: String,
    pub broker_url: String,
    pub auth_username: String,
    pub auth_password: String,
}

impl fmt::Debug for BrokerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerRegistration")
            .field("name", &self.name)
            .field("broker_url", &self.broker_url)
            .field("auth_username", &self.auth_username)
            .field("auth_password", &"<redacted>")
            .finish()
    }
}

/// Runtime state of a single application instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceState {
    Starting,
    Running,
    Crashed,
    Flapping,
    Down,
    #[serde(other)]
    Unknown,
}

/// Entry of the `GET /v2/apps/<guid>/instances` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInstance {
    pub state: InstanceState,
}

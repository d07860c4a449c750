//! Shared type definitions for the Foundry control-plane client.
//!
//! These types mirror the JSON documents exchanged with the platform's
//! `/v2` API. Every addressable resource comes wrapped in a
//! [`Resource`] envelope (`metadata` + `entity`), and list endpoints return a
//! [`ResourceList`].

use std::{error::Error, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub mod component;
pub mod job;
pub mod resources;

pub use component::{CloneResult, Component};
pub use job::{Job, JobDescriptor, JobStatus};
pub use resources::{
    App, AppInstance, AppState, AppSummary, AppUpdate, BrokerRegistration, CopyBitsRequest, Domain, InstanceState, Route,
    ServiceBinding, ServiceBroker, ServiceInstance, ServiceInstanceRequest, ServicePlan, SummaryPlan, SummaryRoute, SummaryService,
    SummaryServiceOffering,
};

/// Opaque identifier assigned by the control plane to every resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(String);

impl Guid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Guid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Guid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Kind of control-plane resource a [`Guid`] refers to.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    App,
    Route,
    Space,
    ServiceInstance,
    UserProvidedServiceInstance,
    ServiceBinding,
    ServicePlan,
    Service,
    ServiceBroker,
    Job,
}

impl ResourceKind {
    /// Collection segment used in `/v2/<collection>/<guid>` paths.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::App => "apps",
            Self::Route => "routes",
            Self::Space => "spaces",
            Self::ServiceInstance => "service_instances",
            Self::UserProvidedServiceInstance => "user_provided_service_instances",
            Self::ServiceBinding => "service_bindings",
            Self::ServicePlan => "service_plans",
            Self::Service => "services",
            Self::ServiceBroker => "service_brokers",
            Self::Job => "jobs",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Route => "route",
            Self::Space => "space",
            Self::ServiceInstance => "service-instance",
            Self::UserProvidedServiceInstance => "user-provided-service-instance",
            Self::ServiceBinding => "service-binding",
            Self::ServicePlan => "service-plan",
            Self::Service => "service",
            Self::ServiceBroker => "service-broker",
            Self::Job => "job",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResourceKind {
    type Err = ParseResourceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app" => Ok(Self::App),
            "route" => Ok(Self::Route),
            "space" => Ok(Self::Space),
            "service-instance" => Ok(Self::ServiceInstance),
            "user-provided-service-instance" => Ok(Self::UserProvidedServiceInstance),
            "service-binding" => Ok(Self::ServiceBinding),
            "service-plan" => Ok(Self::ServicePlan),
            "service" => Ok(Self::Service),
            "service-broker" => Ok(Self::ServiceBroker),
            "job" => Ok(Self::Job),
            _ => Err(ParseResourceKindError),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseResourceKindError;

impl fmt::Display for ParseResourceKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown resource kind")
    }
}

impl Error for ParseResourceKindError {}

/// Immutable address of a single control-plane resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub guid: Guid,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, guid: impl Into<Guid>) -> Self {
        Self { kind, guid: guid.into() }
    }

    pub fn app(guid: impl Into<Guid>) -> Self {
        Self::new(ResourceKind::App, guid)
    }

    pub fn route(guid: impl Into<Guid>) -> Self {
        Self::new(ResourceKind::Route, guid)
    }

    /// API-relative path of the resource, e.g. `/v2/apps/<guid>`.
    pub fn path(&self) -> String {
        format!("/v2/{}/{}", self.kind.collection(), self.guid)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.guid)
    }
}

/// Metadata block attached to every resource returned by the control plane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub guid: Guid,
    /// Self link of the resource (for jobs this is the URL to poll).
    #[serde(default)]
    pub url: String,
}

/// `metadata` + `entity` envelope used by single-resource responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource<E> {
    #[serde(default)]
    pub metadata: Metadata,
    pub entity: E,
}

impl<E> Resource<E> {
    pub fn guid(&self) -> &Guid {
        &self.metadata.guid
    }
}

/// Paged collection envelope returned by list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceList<E> {
    #[serde(default)]
    pub total_results: u64,
    #[serde(default = "Vec::new")]
    pub resources: Vec<Resource<E>>,
}

impl<E> Default for ResourceList<E> {
    fn default() -> Self {
        Self {
            total_results: 0,
            resources: Vec::new(),
        }
    }
}

impl<E> ResourceList<E> {
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }
}

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use foundry_types::{
    App, AppInstance, AppSummary, AppUpdate, BrokerRegistration, CopyBitsRequest, Guid, Job, Resource, ResourceList, ResourceRef, Route,
    ServiceBinding, ServiceBroker, ServiceInstance, ServiceInstanceRequest, ServicePlan,
};
use indexmap::IndexMap;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url, header};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::decode::{body_preview, decode_json};
use crate::error::{GatewayError, StatusClass, classify_status, status_hint};
use crate::gateway::Gateway;

/// Environment variable holding the API base URL.
pub const API_BASE_ENV: &str = "FOUNDRY_API_BASE";
/// Environment variable holding the bearer token.
pub const API_TOKEN_ENV: &str = "FOUNDRY_API_TOKEN";
/// Base URL used when `FOUNDRY_API_BASE` is unset.
pub const DEFAULT_API_BASE: &str = "https://api.run.example.com";
/// Hostnames allowed for local development regardless of scheme.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1"];

#[derive(Debug, Clone)]
/// Thin wrapper around a configured `reqwest::Client` for control-plane access.
///
/// The client pre-configures default headers and builds requests against a
/// validated base URL. It is cheap to clone and safe to share across tasks.
pub struct FoundryClient {
    pub base_url: String,
    pub http: Client,
    pub user_agent: String,
}

impl FoundryClient {
    /// Construct a client for `base_url`, authenticating with `api_token` when present.
    pub fn new(base_url: &str, api_token: Option<&str>) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        validate_base_url(&base_url)?;

        let mut default_headers = header::HeaderMap::new();
        if let Some(api_token) = api_token.filter(|token| !token.trim().is_empty()) {
            let authorization_header_value = format!("Bearer {}", api_token.trim());
            let mut value = header::HeaderValue::from_str(&authorization_header_value).context("invalid API token")?;
            value.set_sensitive(true);
            default_headers.insert(header::AUTHORIZATION, value);
        }
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(30))
            .build()
            .context("build http client")?;

        Ok(Self {
            base_url,
            http,
            user_agent: format!("foundry/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        })
    }

    /// Construct a [`FoundryClient`] from `FOUNDRY_API_BASE` and `FOUNDRY_API_TOKEN`.
    pub fn new_from_env() -> Result<Self> {
        let base_url = env::var(API_BASE_ENV).unwrap_or_else(|_| DEFAULT_API_BASE.into());
        let api_token = env::var(API_TOKEN_ENV).ok();
        Self::new(&base_url, api_token.as_deref())
    }

    /// Build a `reqwest::RequestBuilder` for a method and API-relative path.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "building request");

        self.http.request(method, url).header(header::USER_AGENT, &self.user_agent)
    }

    /// Resolve a link handed out by the control plane (job or plan URLs).
    ///
    /// Relative links are joined to the base URL; absolute links must point at
    /// the same host.
    fn resolve_link(&self, link: &str) -> Result<String, GatewayError> {
        if link.starts_with('/') {
            return Ok(format!("{}{}", self.base_url, link));
        }
        let parsed = Url::parse(link).map_err(|error| GatewayError::transport(format!("invalid resource link '{link}': {error}")))?;
        let base = Url::parse(&self.base_url).map_err(|error| GatewayError::transport(error.to_string()))?;
        if parsed.host_str() != base.host_str() {
            return Err(GatewayError::transport(format!(
                "refusing to follow link '{link}' outside of {}",
                self.base_url
            )));
        }
        Ok(parsed.to_string())
    }

    async fn execute(&self, request: RequestBuilder, method: &Method, path: &str) -> Result<(StatusCode, String), GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|error| GatewayError::transport(format!("{method} {path}: {error}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|error| GatewayError::transport(format!("{method} {path}: reading body: {error}")))?;
        debug!(%method, %path, status = status.as_u16(), "gateway response");

        match classify_status(status) {
            StatusClass::Success => Ok((status, text)),
            StatusClass::Absent | StatusClass::Unexpected => {
                let message = match status_hint(status.as_u16()) {
                    Some(hint) => format!("{method} {path}: {hint}"),
                    None => format!("{method} {path}: {}", body_preview(&text)),
                };
                Err(GatewayError::status(status.as_u16(), message))
            }
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let (status, text) = self.execute(self.request(Method::GET, path), &Method::GET, path).await?;
        decode_json(path, status.as_u16(), &text)
    }

    async fn fetch_link<T: DeserializeOwned>(&self, link: &str) -> Result<T, GatewayError> {
        let url = self.resolve_link(link)?;
        let request = self.http.get(&url).header(header::USER_AGENT, &self.user_agent);
        let (status, text) = self.execute(request, &Method::GET, link).await?;
        decode_json(link, status.as_u16(), &text)
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let request = self.request(method.clone(), path).json(body);
        let (status, text) = self.execute(request, &method, path).await?;
        decode_json(path, status.as_u16(), &text)
    }

    async fn send_body<B>(&self, method: Method, path: &str, body: &B) -> Result<(), GatewayError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let request = self.request(method.clone(), path).json(body);
        self.execute(request, &method, path).await.map(|_| ())
    }

    async fn send_empty(&self, method: Method, path: &str) -> Result<(), GatewayError> {
        let request = self.request(method.clone(), path);
        self.execute(request, &method, path).await.map(|_| ())
    }
}

#[async_trait]
impl Gateway for FoundryClient {
    async fn app_summary(&self, app: &Guid) -> Result<AppSummary, GatewayError> {
        self.fetch(&format!("/v2/apps/{app}/summary")).await
    }

    async fn create_app(&self, app: &App) -> Result<Resource<App>, GatewayError> {
        self.send_json(Method::POST, "/v2/apps", app).await
    }

    async fn update_app(&self, app: &Guid, update: &AppUpdate) -> Result<(), GatewayError> {
        self.send_body(Method::PUT, &format!("/v2/apps/{app}"), update).await
    }

    async fn delete_app(&self, app: &Guid) -> Result<(), GatewayError> {
        self.send_empty(Method::DELETE, &format!("/v2/apps/{app}")).await
    }

    async fn app_instances(&self, app: &Guid) -> Result<IndexMap<String, AppInstance>, GatewayError> {
        self.fetch(&format!("/v2/apps/{app}/instances")).await
    }

    async fn create_route(&self, route: &Route) -> Result<Resource<Route>, GatewayError> {
        self.send_json(Method::POST, "/v2/routes", route).await
    }

    async fn associate_route(&self, app: &Guid, route: &Guid) -> Result<(), GatewayError> {
        self.send_empty(Method::PUT, &format!("/v2/apps/{app}/routes/{route}")).await
    }

    async fn unassociate_route(&self, app: &Guid, route: &Guid) -> Result<(), GatewayError> {
        self.send_empty(Method::DELETE, &format!("/v2/apps/{app}/routes/{route}")).await
    }

    async fn delete_route(&self, route: &Guid) -> Result<(), GatewayError> {
        self.send_empty(Method::DELETE, &format!("/v2/routes/{route}")).await
    }

    async fn app_bindings(&self, app: &Guid) -> Result<ResourceList<ServiceBinding>, GatewayError> {
        self.fetch(&format!("/v2/apps/{app}/service_bindings")).await
    }

    async fn delete_binding(&self, app: &Guid, binding: &Guid) -> Result<(), GatewayError> {
        self.send_empty(Method::DELETE, &format!("/v2/apps/{app}/service_bindings/{binding}"))
            .await
    }

    async fn instance_bindings(&self, instance: &ResourceRef) -> Result<ResourceList<ServiceBinding>, GatewayError> {
        self.fetch(&format!("{}/service_bindings", instance.path())).await
    }

    async fn delete_instance(&self, instance: &ResourceRef) -> Result<(), GatewayError> {
        self.send_empty(Method::DELETE, &instance.path()).await
    }

    async fn create_service_instance(&self, request: &ServiceInstanceRequest) -> Result<Resource<ServiceInstance>, GatewayError> {
        self.send_json(Method::POST, "/v2/service_instances?accepts_incomplete=false", request)
            .await
    }

    async fn copy_bits(&self, source: &Guid, target: &Guid) -> Result<Resource<Job>, GatewayError> {
        let body = CopyBitsRequest {
            source_app_guid: source.clone(),
        };
        self.send_json(Method::POST, &format!("/v2/apps/{target}/copy_bits"), &body)
            .await
    }

    async fn job(&self, url: &str) -> Result<Resource<Job>, GatewayError> {
        self.fetch_link(url).await
    }

    async fn service_plans(&self, plans_url: &str) -> Result<ResourceList<ServicePlan>, GatewayError> {
        self.fetch_link(plans_url).await
    }

    async fn delete_service_plan(&self, plan: &Guid) -> Result<(), GatewayError> {
        self.send_empty(Method::DELETE, &format!("/v2/service_plans/{plan}")).await
    }

    async fn purge_service(&self, service: &Guid) -> Result<(), GatewayError> {
        self.send_empty(Method::DELETE, &format!("/v2/services/{service}?purge=true"))
            .await
    }

    async fn brokers_named(&self, name: &str) -> Result<ResourceList<ServiceBroker>, GatewayError> {
        let path = "/v2/service_brokers";
        let request = self.request(Method::GET, path).query(&[("q", format!("name:{name}"))]);
        let (status, text) = self.execute(request, &Method::GET, path).await?;
        decode_json(path, status.as_u16(), &text)
    }

    async fn register_broker(&self, registration: &BrokerRegistration) -> Result<(), GatewayError> {
        self.send_body(Method::POST, "/v2/service_brokers", registration).await
    }

    async fn update_broker(&self, broker: &Guid, registration: &BrokerRegistration) -> Result<(), GatewayError> {
        self.send_body(Method::PUT, &format!("/v2/service_brokers/{broker}"), registration)
            .await
    }
}

/// Validate that a base URL is acceptable for use by the client.
///
/// Rules:
/// - `localhost` or `127.0.0.1`: any scheme is allowed
/// - otherwise: scheme must be HTTPS
fn validate_base_url(base: &str) -> Result<()> {
    let parsed_base_url = Url::parse(base).map_err(|e| anyhow!("Invalid {API_BASE_ENV} URL '{}': {}", base, e))?;

    let host_name = parsed_base_url
        .host_str()
        .ok_or_else(|| anyhow!("{API_BASE_ENV} must include a host"))?;

    if LOCALHOST_DOMAINS
        .iter()
        .any(|&allowed| host_name.eq_ignore_ascii_case(allowed))
    {
        return Ok(());
    }

    if parsed_base_url.scheme() != "https" {
        return Err(anyhow!(
            "{API_BASE_ENV} must use https for non-localhost hosts; got '{}://'",
            parsed_base_url.scheme()
        ));
    }

    Ok(())
}

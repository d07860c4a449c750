//! Subcommands and their mapping onto engine workflows.

use std::{env, future::Future, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use foundry_engine::{AppCloneRequest, InstanceKind, Orchestrator, WorkflowError};
use foundry_types::{BrokerRegistration, Component, Guid};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

/// Environment variable holding the broker password for `ensure-broker`.
pub const BROKER_PASSWORD_ENV: &str = "FOUNDRY_BROKER_PASSWORD";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Clone an application into a space, with a fresh route
    CloneApp(CloneAppArgs),
    /// Create a new instance of a bound service instance's plan
    CloneService(CloneServiceArgs),
    /// Delete a service instance unless something is bound to it
    DeleteService(DeleteServiceArgs),
    /// Detach and delete every route of an application
    DeleteRoutes(AppArgs),
    /// Delete every service binding of an application
    UnbindServices(AppArgs),
    /// Copy application bits and wait for the copy job
    CopyBits(CopyBitsArgs),
    /// Start an application and wait for a running instance
    StartApp(AppArgs),
    /// Delete a service's plans and purge the service
    PurgeService(PurgeServiceArgs),
    /// Remove an application with its routes and bindings
    TeardownApp(AppArgs),
    /// Register a service broker, or update it when it already exists
    EnsureBroker(EnsureBrokerArgs),
}

#[derive(Debug, Args)]
pub struct AppArgs {
    /// Application GUID
    pub app: String,
}

#[derive(Debug, Args)]
pub struct CloneAppArgs {
    /// GUID of the application to clone
    pub source: String,
    /// Name of the new application
    #[arg(long)]
    pub name: String,
    /// Target space GUID
    #[arg(long)]
    pub space: String,
    /// Route host for the clone (defaults to the name)
    #[arg(long)]
    pub host: Option<String>,
    /// Environment variable for the clone, as KEY=VALUE
    #[arg(long = "env", value_parser = parse_key_value)]
    pub environment: Vec<(String, String)>,
}

impl CloneAppArgs {
    fn request(&self) -> AppCloneRequest {
        AppCloneRequest {
            name: self.name.clone(),
            space: Guid::from(self.space.as_str()),
            host: self.host.clone(),
            environment: self.environment.iter().cloned().collect::<IndexMap<_, _>>(),
        }
    }
}

#[derive(Debug, Args)]
pub struct ComponentArgs {
    /// Service instance GUID
    pub guid: String,
    /// Service instance name
    #[arg(long)]
    pub name: String,
    /// GUID of an app bound to the instance (repeatable)
    #[arg(long = "dependent")]
    pub dependents: Vec<String>,
}

impl ComponentArgs {
    fn component(&self) -> Component {
        Component::new(self.guid.as_str(), self.name.as_str()).with_dependents(self.dependents.iter().map(String::as_str))
    }
}

#[derive(Debug, Args)]
pub struct CloneServiceArgs {
    #[command(flatten)]
    pub component: ComponentArgs,
    /// Target space GUID
    #[arg(long)]
    pub space: String,
    /// Suffix appended to the clone's name
    #[arg(long, default_value = "clone")]
    pub suffix: String,
    /// Provisioning parameter as KEY=VALUE; JSON values are passed through
    #[arg(long = "param", value_parser = parse_key_value)]
    pub parameters: Vec<(String, String)>,
}

impl CloneServiceArgs {
    fn parameters(&self) -> Map<String, Value> {
        self.parameters
            .iter()
            .map(|(key, raw)| {
                let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
                (key.clone(), value)
            })
            .collect()
    }
}

#[derive(Debug, Args)]
pub struct DeleteServiceArgs {
    #[command(flatten)]
    pub component: ComponentArgs,
    /// The instance is user-provided
    #[arg(long)]
    pub user_provided: bool,
}

#[derive(Debug, Args)]
pub struct CopyBitsArgs {
    /// Application to copy bits from
    pub source: String,
    /// Application receiving the bits
    pub target: String,
}

#[derive(Debug, Args)]
pub struct PurgeServiceArgs {
    /// Service GUID
    pub service: String,
    /// Link to the service's plans (defaults to /v2/services/<guid>/service_plans)
    #[arg(long)]
    pub plans_url: Option<String>,
}

#[derive(Debug, Args)]
pub struct EnsureBrokerArgs {
    /// Broker name
    #[arg(long)]
    pub name: String,
    /// Broker URL
    #[arg(long)]
    pub url: String,
    /// Basic auth username presented to the broker
    #[arg(long)]
    pub username: String,
}

/// Parse `KEY=VALUE` arguments.
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Run `command` as a launched workflow and render its result as JSON.
pub async fn run(orchestrator: &Orchestrator, command: Command, cancel: &CancellationToken, deadline: Option<Duration>) -> Result<Value> {
    match command {
        Command::CloneApp(args) => {
            let source = Guid::from(args.source.as_str());
            let request = args.request();
            launch(orchestrator, cancel, deadline, move |orchestrator, cancel| async move {
                orchestrator.clone_application(&source, &request, &cancel).await
            })
            .await
        }
        Command::CloneService(args) => {
            let space = Guid::from(args.space.as_str());
            let parameters = args.parameters();
            let component = args.component.component();
            let suffix = args.suffix;
            launch(orchestrator, cancel, deadline, move |orchestrator, cancel| async move {
                orchestrator
                    .clone_service_instance(&space, &parameters, &component, &suffix, &cancel)
                    .await
            })
            .await
        }
        Command::DeleteService(args) => {
            let component = args.component.component();
            let kind = if args.user_provided {
                InstanceKind::UserProvided
            } else {
                InstanceKind::Managed
            };
            launch(orchestrator, cancel, deadline, move |orchestrator, cancel| async move {
                let outcome = orchestrator.delete_instance_if_unbound(&component, kind, &cancel).await?;
                Ok(json!({ "instance": component.guid, "outcome": outcome }))
            })
            .await
        }
        Command::DeleteRoutes(args) => {
            let app = Guid::from(args.app.as_str());
            launch(orchestrator, cancel, deadline, move |orchestrator, cancel| async move {
                let routes = orchestrator.delete_app_routes(&app, &cancel).await?;
                Ok(json!({ "app": app, "routesDeleted": routes }))
            })
            .await
        }
        Command::UnbindServices(args) => {
            let app = Guid::from(args.app.as_str());
            launch(orchestrator, cancel, deadline, move |orchestrator, cancel| async move {
                let bindings = orchestrator.unbind_app_services(&app, &cancel).await?;
                Ok(json!({ "app": app, "bindingsDeleted": bindings }))
            })
            .await
        }
        Command::CopyBits(args) => {
            let source = Guid::from(args.source.as_str());
            let target = Guid::from(args.target.as_str());
            launch(orchestrator, cancel, deadline, move |orchestrator, cancel| async move {
                orchestrator.copy_app_bits(&source, &target, &cancel).await?;
                Ok(json!({ "source": source, "target": target, "status": "finished" }))
            })
            .await
        }
        Command::StartApp(args) => {
            let app = Guid::from(args.app.as_str());
            launch(orchestrator, cancel, deadline, move |orchestrator, cancel| async move {
                orchestrator.start_application(&app, &cancel).await?;
                Ok(json!({ "app": app, "state": "STARTED" }))
            })
            .await
        }
        Command::PurgeService(args) => {
            let plans_url = args
                .plans_url
                .unwrap_or_else(|| format!("/v2/services/{}/service_plans", args.service));
            let service = Guid::from(args.service);
            launch(orchestrator, cancel, deadline, move |orchestrator, cancel| async move {
                let outcome = orchestrator.purge_service(&service, &plans_url, &cancel).await?;
                Ok(json!({ "service": service, "outcome": outcome }))
            })
            .await
        }
        Command::TeardownApp(args) => {
            let app = Guid::from(args.app.as_str());
            launch(orchestrator, cancel, deadline, move |orchestrator, cancel| async move {
                orchestrator.tear_down_application(&app, &cancel).await
            })
            .await
        }
        Command::EnsureBroker(args) => {
            let auth_password = env::var(BROKER_PASSWORD_ENV).with_context(|| format!("{BROKER_PASSWORD_ENV} must be set"))?;
            let registration = BrokerRegistration {
                name: args.name,
                broker_url: args.url,
                auth_username: args.username,
                auth_password,
            };
            launch(orchestrator, cancel, deadline, move |orchestrator, cancel| async move {
                orchestrator.ensure_broker(&registration, &cancel).await
            })
            .await
        }
    }
}

async fn launch<T, F, Fut>(orchestrator: &Orchestrator, cancel: &CancellationToken, deadline: Option<Duration>, workflow: F) -> Result<Value>
where
    T: Serialize + Send + 'static,
    F: FnOnce(Orchestrator, CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, WorkflowError>> + Send + 'static,
{
    let outcome = orchestrator.launch(cancel, deadline, workflow).outcome().await?;
    serde_json::to_value(outcome).context("failed to render workflow result")
}

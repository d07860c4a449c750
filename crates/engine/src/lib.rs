//! # Foundry Engine
//!
//! Multi-step orchestration over the Foundry control-plane API. The engine
//! turns single-resource gateway calls into compound operations: cloning
//! apps and service instances, tearing down routes and bindings, copying
//! bits and waiting for apps to start.
//!
//! ## Key Features
//!
//! - **Fan-out**: independent siblings run concurrently; the first failure is
//!   reported only after every sibling has settled
//! - **Job polling**: server-side jobs are polled with bounded attempts and an
//!   optional deadline
//! - **Absence policy**: each step declares whether a 404 means "already done"
//!   or is a failure
//! - **Cancellation**: every workflow takes a `CancellationToken` that is
//!   honored at each gateway call and each poll interval
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use foundry_api::FoundryClient;
//! use foundry_engine::{Orchestrator, load_settings};
//! use foundry_types::Guid;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn remove_routes() -> anyhow::Result<()> {
//!     let orchestrator = Orchestrator::new(Arc::new(FoundryClient::new_from_env()?), load_settings()?);
//!     let removed = orchestrator
//!         .delete_app_routes(&Guid::from("app-guid"), &CancellationToken::new())
//!         .await?;
//!     println!("removed {removed} routes");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod executor;
pub mod policy;
pub mod settings;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use error::{Step, WorkflowError};
pub use executor::{FanOut, JobPoller, run_all};
pub use policy::AbsencePolicy;
pub use settings::{CONFIG_PATH_ENV, EngineSettings, PollSettings, SettingsError, default_settings_path, load_settings, load_settings_from_path};
pub use workflow::{AppCloneRequest, BrokerAction, DeletionOutcome, InstanceKind, Orchestrator, TeardownReport, WorkflowHandle, clone_name};

//! Foundry control-plane API client.
//!
//! This crate is the resource gateway used by the orchestration engine. It
//! focuses on:
//!
//! - The [`Gateway`] trait: one async method per single-resource action
//! - [`FoundryClient`], the `reqwest`-backed implementation
//! - Classifying responses into success, absent (404) and unexpected statuses
//! - Decoding JSON bodies strictly, with redacted previews in error messages
//!
//! # Example
//!
//! ```ignore
//! use foundry_api::{FoundryClient, Gateway};
//! use foundry_types::Guid;
//!
//! async fn show_routes() -> anyhow::Result<()> {
//!     let client = FoundryClient::new_from_env()?;
//!     let summary = client.app_summary(&Guid::from("app-guid")).await?;
//!     for route in &summary.routes {
//!         println!("{route}");
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod decode;
mod error;
mod gateway;

pub use client::{API_BASE_ENV, API_TOKEN_ENV, DEFAULT_API_BASE, FoundryClient};
pub use decode::{body_preview, decode_json, redact_sensitive};
pub use error::{GatewayError, StatusClass, classify_status, status_hint};
pub use gateway::Gateway;

//! SaaS Runtime project provisioner library.
//!
//! Programmatic access to the provisioning sequence, so the steps can be
//! driven from other tooling as well as the `saas-provision` binary.
//!
//! # Example
//!
//! ```ignore
//! use gcloud::{GcloudBinary, GcloudClient};
//! use saas_provision::{ProvisionConfig, Provisioner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ProvisionConfig::with_defaults("my-project".into(), "images".into());
//!     let client = GcloudClient::new(GcloudBinary::discover()?);
//!     Provisioner::new(config, client).run_to_completion().await?;
//!     Ok(())
//! }
//! ```

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]

pub mod commands;
pub mod config;
pub mod context;
pub mod orchestrator;
pub mod ui;
pub mod validator;

// Re-export commonly used types at the crate root
pub use config::ProvisionConfig;
pub use context::ProvisionContext;
pub use orchestrator::{PollConfig, ProvisionStep, Provisioner};

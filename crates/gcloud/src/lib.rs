//! Wrapper around the `gcloud` CLI for SaaS Runtime project provisioning.
//!
//! This crate treats the Google Cloud control plane as an opaque command
//! boundary: every operation shells out to `gcloud`, and failures are
//! classified into a typed error so callers can tell genuine absence
//! (safe to create) apart from transport or permission problems.

mod client;
mod error;
mod runner;

pub use client::GcloudClient;
pub use error::GcloudError;
pub use runner::{CommandOutput, CommandRunner, GcloudBinary};

//! Input and prerequisite validation.

use anyhow::{bail, Result};
use gcloud::{CommandRunner, GcloudClient};

use crate::ui;

/// Reject empty inputs before anything touches the control plane.
///
/// This is the only input validation performed: format, length and legality
/// of the values are left to the control plane itself.
///
/// # Errors
///
/// Returns an error if either value is empty after trimming.
pub fn validate_inputs(project_id: &str, registry_name: &str) -> Result<()> {
    if project_id.trim().is_empty() {
        bail!("Project ID must not be empty");
    }
    if registry_name.trim().is_empty() {
        bail!("Registry name must not be empty");
    }
    Ok(())
}

/// Validates that the gcloud SDK is usable before provisioning starts.
pub struct PrerequisitesValidator;

impl PrerequisitesValidator {
    /// Check SDK presence and an authenticated account, reporting each
    /// result to the console.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK probe fails or no account is active.
    pub fn validate<R: CommandRunner>(client: &GcloudClient<R>) -> Result<()> {
        ui::print_section("Checking prerequisites");

        match client.sdk_version() {
            Ok(version) => ui::print_check_result("Google Cloud SDK", true, Some(&version)),
            Err(e) => {
                ui::print_check_result("Google Cloud SDK", false, Some(&e.to_string()));
                return Err(e.into());
            }
        }

        match client.active_account()? {
            Some(account) => ui::print_check_result("Authenticated account", true, Some(&account)),
            None => {
                ui::print_check_result(
                    "Authenticated account",
                    false,
                    Some("no active account found"),
                );
                bail!("No active gcloud account - run `gcloud auth login` first");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_project_id_rejected() {
        assert!(validate_inputs("", "images").is_err());
        assert!(validate_inputs("   ", "images").is_err());
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert!(validate_inputs("my-proj", "").is_err());
        assert!(validate_inputs("my-proj", "  ").is_err());
    }

    #[test]
    fn test_valid_inputs_accepted() {
        assert!(validate_inputs("my-proj", "images").is_ok());
    }
}

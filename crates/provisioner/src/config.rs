//! Provisioning configuration and derived identifiers.
//!
//! Everything here is a fixed constant or a pure function of the project ID
//! and project number. The only random identifier in the whole run is the
//! throwaway SaaS-type probe name.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default region for the SaaS type probe and the Artifact Registry repo.
pub const DEFAULT_REGION: &str = "us-central1";

/// APIs that must be enabled before any other resource is touched.
pub const REQUIRED_APIS: [&str; 7] = [
    "cloudresourcemanager.googleapis.com",
    "serviceusage.googleapis.com",
    "iam.googleapis.com",
    "compute.googleapis.com",
    "artifactregistry.googleapis.com",
    "config.googleapis.com",
    "saasservicemgmt.googleapis.com",
];

/// Roles granted to the SaaS Runtime service agent (P4SA).
pub const SAAS_RUNTIME_ROLES: [&str; 5] = [
    "roles/saasservicemgmt.serviceAgent",
    "roles/config.admin",
    "roles/iam.serviceAccountUser",
    "roles/artifactregistry.reader",
    "roles/logging.logWriter",
];

/// Roles granted to the Infra Manager service account.
pub const INFRA_MANAGER_ROLES: [&str; 5] = [
    "roles/config.agent",
    "roles/compute.admin",
    "roles/iam.serviceAccountUser",
    "roles/storage.admin",
    "roles/artifactregistry.reader",
];

/// Roles granted to the compute service account (default or fallback).
pub const COMPUTE_ROLES: [&str; 6] = [
    "roles/logging.logWriter",
    "roles/monitoring.metricWriter",
    "roles/artifactregistry.reader",
    "roles/storage.objectViewer",
    "roles/config.agent",
    "roles/iam.serviceAccountUser",
];

/// Account ID for the user-managed Infra Manager service account.
pub const INFRA_MANAGER_ACCOUNT_ID: &str = "infra-manager";
/// Display name for the Infra Manager service account.
pub const INFRA_MANAGER_DISPLAY_NAME: &str = "Infra Manager service account";

/// Account ID for the fallback compute service account, created only when
/// the compute default service account is absent.
pub const FALLBACK_COMPUTE_ACCOUNT_ID: &str = "saas-runtime-compute";
/// Display name for the fallback compute service account.
pub const FALLBACK_COMPUTE_DISPLAY_NAME: &str = "SaaS Runtime compute service account";

/// Artifact Registry repository format.
pub const REGISTRY_FORMAT: &str = "docker";
/// Artifact Registry repository description.
pub const REGISTRY_DESCRIPTION: &str = "Container images for SaaS Runtime workloads";

/// Full provisioning configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// User-supplied project ID.
    pub project_id: String,
    /// User-supplied Artifact Registry repository name.
    pub registry_name: String,
    /// Region for the registry and the SaaS-type probe.
    pub region: String,
}

impl ProvisionConfig {
    /// Create a config with the default region.
    #[must_use]
    pub fn with_defaults(project_id: String, registry_name: String) -> Self {
        Self {
            project_id,
            registry_name,
            region: DEFAULT_REGION.to_string(),
        }
    }

    /// Email of the user-managed Infra Manager service account.
    #[must_use]
    pub fn infra_manager_email(&self) -> String {
        format!(
            "{INFRA_MANAGER_ACCOUNT_ID}@{}.iam.gserviceaccount.com",
            self.project_id
        )
    }

    /// Email of the fallback compute service account.
    #[must_use]
    pub fn fallback_compute_email(&self) -> String {
        format!(
            "{FALLBACK_COMPUTE_ACCOUNT_ID}@{}.iam.gserviceaccount.com",
            self.project_id
        )
    }

    /// Full resource path of the registry, for the success summary.
    #[must_use]
    pub fn registry_path(&self) -> String {
        format!(
            "{}-docker.pkg.dev/{}/{}",
            self.region, self.project_id, self.registry_name
        )
    }
}

/// Email of the SaaS Runtime service agent (P4SA) for a project number.
/// The agent is provider-managed and cannot be created directly.
#[must_use]
pub fn saas_runtime_p4sa(project_number: &str) -> String {
    format!("service-{project_number}@gcp-sa-saasservicemgmt.iam.gserviceaccount.com")
}

/// Email of the compute default service account for a project number.
#[must_use]
pub fn compute_default_email(project_number: &str) -> String {
    format!("{project_number}-compute@developer.gserviceaccount.com")
}

/// Name for the throwaway SaaS-type probe. Random so a crashed earlier run
/// cannot collide with this one; the probe is deleted within the same step.
#[must_use]
pub fn temp_saas_type_name() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("bootstrap-probe-{}", &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ProvisionConfig::with_defaults("my-proj".into(), "images".into());
        assert_eq!(config.project_id, "my-proj");
        assert_eq!(config.registry_name, "images");
        assert_eq!(config.region, "us-central1");
    }

    #[test]
    fn test_derived_emails_are_deterministic() {
        assert_eq!(
            saas_runtime_p4sa("123456789012"),
            "service-123456789012@gcp-sa-saasservicemgmt.iam.gserviceaccount.com"
        );
        assert_eq!(
            compute_default_email("123456789012"),
            "123456789012-compute@developer.gserviceaccount.com"
        );

        let config = ProvisionConfig::with_defaults("my-proj".into(), "images".into());
        assert_eq!(
            config.infra_manager_email(),
            "infra-manager@my-proj.iam.gserviceaccount.com"
        );
        assert_eq!(
            config.fallback_compute_email(),
            "saas-runtime-compute@my-proj.iam.gserviceaccount.com"
        );
    }

    #[test]
    fn test_registry_path() {
        let config = ProvisionConfig::with_defaults("my-proj".into(), "images".into());
        assert_eq!(config.registry_path(), "us-central1-docker.pkg.dev/my-proj/images");
    }

    #[test]
    fn test_temp_saas_type_name_is_unique_per_call() {
        let a = temp_saas_type_name();
        let b = temp_saas_type_name();
        assert!(a.starts_with("bootstrap-probe-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_role_list_sizes() {
        assert_eq!(REQUIRED_APIS.len(), 7);
        assert_eq!(SAAS_RUNTIME_ROLES.len(), 5);
        assert_eq!(INFRA_MANAGER_ROLES.len(), 5);
        assert_eq!(COMPUTE_ROLES.len(), 6);
    }
}

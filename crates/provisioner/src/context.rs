//! Run context threaded through the provisioning steps.
//!
//! Identifiers produced by earlier steps (project number, resolved service
//! account emails) live here instead of process-wide state. Accessors error
//! out if a step reads a value its predecessor should have produced.

use anyhow::{Context, Result};

/// Values resolved during a provisioning run.
#[derive(Debug, Default)]
pub struct ProvisionContext {
    /// Numeric project number, fetched after the project exists.
    pub project_number: Option<String>,
    /// SaaS Runtime service agent email (derived from the project number).
    pub saas_runtime_sa: Option<String>,
    /// Infra Manager service account email.
    pub infra_manager_sa: Option<String>,
    /// Compute service account email actually resolved for grants: the
    /// compute default when present, otherwise the created fallback.
    pub compute_sa: Option<String>,
}

impl ProvisionContext {
    pub fn project_number(&self) -> Result<&str> {
        self.project_number
            .as_deref()
            .context("Project number not resolved yet")
    }

    pub fn saas_runtime_sa(&self) -> Result<&str> {
        self.saas_runtime_sa
            .as_deref()
            .context("SaaS Runtime service agent email not resolved yet")
    }

    pub fn infra_manager_sa(&self) -> Result<&str> {
        self.infra_manager_sa
            .as_deref()
            .context("Infra Manager service account email not resolved yet")
    }

    pub fn compute_sa(&self) -> Result<&str> {
        self.compute_sa
            .as_deref()
            .context("Compute service account email not resolved yet")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_error_before_resolution() {
        let ctx = ProvisionContext::default();
        assert!(ctx.project_number().is_err());
        assert!(ctx.compute_sa().is_err());
    }

    #[test]
    fn test_accessors_return_resolved_values() {
        let ctx = ProvisionContext {
            project_number: Some("123".into()),
            ..Default::default()
        };
        assert_eq!(ctx.project_number().unwrap(), "123");
    }
}

//! Provisioning orchestration.
//!
//! Executes the fixed step sequence against the control plane: ensure the
//! project, enable APIs, resolve identities, bootstrap the SaaS Runtime
//! service agent, grant roles, and ensure the Artifact Registry repository.
//! Steps run strictly in order; the first failing step stops the run.

use std::time::Duration;

use anyhow::{Context, Result};
use gcloud::{CommandRunner, GcloudClient};
use indicatif::ProgressBar;
use tracing::{error, info, warn};

use crate::config::{self, ProvisionConfig};
use crate::context::ProvisionContext;
use crate::ui;

/// Bounded-poll settings for waiting on the SaaS Runtime service agent.
///
/// Upstream provisions the agent asynchronously after the first SaaS
/// resource is created; rather than sleeping a fixed delay we poll its
/// existence until a hard deadline.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Hard deadline for the agent to appear.
    pub timeout: Duration,
    /// Delay between existence checks.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            interval: Duration::from_secs(10),
        }
    }
}

/// Provisioning steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    /// Ensuring the project exists.
    EnsuringProject,
    /// Enabling the required APIs.
    EnablingApis,
    /// Fetching the project number and deriving account emails.
    ResolvingIdentity,
    /// Triggering and awaiting the SaaS Runtime service agent.
    BootstrappingSaasRuntimeSa,
    /// Granting roles to the SaaS Runtime service agent.
    GrantingSaasRuntimeRoles,
    /// Ensuring the Infra Manager service account exists.
    EnsuringInfraManagerSa,
    /// Granting roles to the Infra Manager service account.
    GrantingInfraManagerRoles,
    /// Resolving the compute service account (default or fallback).
    ResolvingComputeSa,
    /// Granting roles to the resolved compute service account.
    GrantingComputeRoles,
    /// Ensuring the Artifact Registry repository exists.
    EnsuringRegistry,
    /// Terminal state.
    Complete,
}

impl ProvisionStep {
    /// Total number of executable steps, for progress display.
    pub const TOTAL_STEPS: u8 = 10;

    /// The next step in the sequence.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::EnsuringProject => Self::EnablingApis,
            Self::EnablingApis => Self::ResolvingIdentity,
            Self::ResolvingIdentity => Self::BootstrappingSaasRuntimeSa,
            Self::BootstrappingSaasRuntimeSa => Self::GrantingSaasRuntimeRoles,
            Self::GrantingSaasRuntimeRoles => Self::EnsuringInfraManagerSa,
            Self::EnsuringInfraManagerSa => Self::GrantingInfraManagerRoles,
            Self::GrantingInfraManagerRoles => Self::ResolvingComputeSa,
            Self::ResolvingComputeSa => Self::GrantingComputeRoles,
            Self::GrantingComputeRoles => Self::EnsuringRegistry,
            Self::EnsuringRegistry | Self::Complete => Self::Complete,
        }
    }

    /// Human-readable description of the step.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::EnsuringProject => "Ensuring project",
            Self::EnablingApis => "Enabling required APIs",
            Self::ResolvingIdentity => "Resolving project number and account emails",
            Self::BootstrappingSaasRuntimeSa => "Bootstrapping SaaS Runtime service agent",
            Self::GrantingSaasRuntimeRoles => "Granting SaaS Runtime service agent roles",
            Self::EnsuringInfraManagerSa => "Ensuring Infra Manager service account",
            Self::GrantingInfraManagerRoles => "Granting Infra Manager roles",
            Self::ResolvingComputeSa => "Resolving compute service account",
            Self::GrantingComputeRoles => "Granting compute service account roles",
            Self::EnsuringRegistry => "Ensuring Artifact Registry repository",
            Self::Complete => "Complete",
        }
    }

    /// Step number for progress display.
    #[must_use]
    pub fn step_number(self) -> u8 {
        match self {
            Self::EnsuringProject => 1,
            Self::EnablingApis => 2,
            Self::ResolvingIdentity => 3,
            Self::BootstrappingSaasRuntimeSa => 4,
            Self::GrantingSaasRuntimeRoles => 5,
            Self::EnsuringInfraManagerSa => 6,
            Self::GrantingInfraManagerRoles => 7,
            Self::ResolvingComputeSa => 8,
            Self::GrantingComputeRoles => 9,
            Self::EnsuringRegistry => 10,
            Self::Complete => 10,
        }
    }
}

impl std::fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Drives the full provisioning sequence against a gcloud client.
pub struct Provisioner<R: CommandRunner> {
    config: ProvisionConfig,
    client: GcloudClient<R>,
    context: ProvisionContext,
    poll: PollConfig,
    step: ProvisionStep,
}

impl<R: CommandRunner> Provisioner<R> {
    /// Create a provisioner for one run.
    pub fn new(config: ProvisionConfig, client: GcloudClient<R>) -> Self {
        Self {
            config,
            client,
            context: ProvisionContext::default(),
            poll: PollConfig::default(),
            step: ProvisionStep::EnsuringProject,
        }
    }

    /// Override the service-agent poll settings.
    #[must_use]
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Run all steps to completion.
    ///
    /// # Errors
    ///
    /// Returns the first step error, annotated with the failing step; no
    /// later step executes after a failure.
    pub async fn run_to_completion(&mut self) -> Result<()> {
        ui::print_section("Provisioning SaaS Runtime project");

        while self.step != ProvisionStep::Complete {
            ui::print_progress_step(
                self.step.step_number(),
                ProvisionStep::TOTAL_STEPS,
                self.step.description(),
            );
            info!(step = ?self.step, "Executing step");

            if let Err(e) = self.execute_current_step().await {
                error!(step = ?self.step, error = %e, "Provisioning failed");
                ui::print_error(&format!("Failed at step '{}': {e:#}", self.step));
                return Err(e.context(format!("step '{}' failed", self.step)));
            }

            self.step = self.step.next();
        }

        self.print_success_summary();
        Ok(())
    }

    async fn execute_current_step(&mut self) -> Result<()> {
        match self.step {
            ProvisionStep::EnsuringProject => self.ensure_project(),
            ProvisionStep::EnablingApis => self.enable_apis(),
            ProvisionStep::ResolvingIdentity => self.resolve_identity(),
            ProvisionStep::BootstrappingSaasRuntimeSa => self.bootstrap_saas_runtime_sa().await,
            ProvisionStep::GrantingSaasRuntimeRoles => {
                let member = self.context.saas_runtime_sa()?.to_string();
                self.grant_roles(&member, &config::SAAS_RUNTIME_ROLES, "SaaS Runtime service agent")
            }
            ProvisionStep::EnsuringInfraManagerSa => self.ensure_infra_manager_sa(),
            ProvisionStep::GrantingInfraManagerRoles => {
                let member = self.context.infra_manager_sa()?.to_string();
                self.grant_roles(&member, &config::INFRA_MANAGER_ROLES, "Infra Manager")
            }
            ProvisionStep::ResolvingComputeSa => self.resolve_compute_sa(),
            ProvisionStep::GrantingComputeRoles => {
                let member = self.context.compute_sa()?.to_string();
                self.grant_roles(&member, &config::COMPUTE_ROLES, "compute service account")
            }
            ProvisionStep::EnsuringRegistry => self.ensure_registry(),
            ProvisionStep::Complete => Ok(()),
        }
    }

    // --- Steps ---

    fn ensure_project(&self) -> Result<()> {
        let project_id = &self.config.project_id;
        if self.client.project_exists(project_id)? {
            ui::print_info(&format!("Project {project_id} already exists, skipping creation"));
            return Ok(());
        }

        self.client
            .create_project(project_id)
            .context("Failed to create project")?;
        ui::print_success(&format!("Project {project_id} created"));
        Ok(())
    }

    fn enable_apis(&self) -> Result<()> {
        for api in config::REQUIRED_APIS {
            info!(api, "Enabling API");
            self.client
                .enable_service(&self.config.project_id, api)
                .with_context(|| format!("Failed to enable {api}"))?;
        }
        ui::print_success(&format!("{} APIs enabled", config::REQUIRED_APIS.len()));
        Ok(())
    }

    fn resolve_identity(&mut self) -> Result<()> {
        let number = self
            .client
            .project_number(&self.config.project_id)
            .context("Failed to fetch project number")?;
        ui::print_kv("Project number", &number);

        self.context.saas_runtime_sa = Some(config::saas_runtime_p4sa(&number));
        self.context.infra_manager_sa = Some(self.config.infra_manager_email());
        self.context.project_number = Some(number);
        Ok(())
    }

    /// The SaaS Runtime service agent cannot be created directly; a
    /// short-lived SaaS-type probe triggers its provisioning upstream.
    /// Probe create and delete tolerate failure because the side effect may
    /// already have happened; only the existence-poll deadline is fatal.
    async fn bootstrap_saas_runtime_sa(&mut self) -> Result<()> {
        let email = self.context.saas_runtime_sa()?.to_string();
        let project_id = &self.config.project_id;

        if self.client.service_account_exists(project_id, &email)? {
            ui::print_info(&format!("SaaS Runtime service agent already present: {email}"));
            return Ok(());
        }

        let probe = config::temp_saas_type_name();
        ui::print_info(&format!("Creating SaaS type probe {probe}"));
        if let Err(e) = self
            .client
            .create_saas_type(project_id, &self.config.region, &probe)
        {
            warn!(error = %e, probe, "SaaS type probe creation failed, continuing");
            ui::print_warning(&format!("Probe creation failed (continuing): {e}"));
        }

        let spinner = ProgressBar::new_spinner();
        spinner.set_message(format!("Waiting for {email}"));
        spinner.enable_steady_tick(Duration::from_millis(120));
        let waited = self
            .client
            .wait_for_service_account(project_id, &email, self.poll.timeout, self.poll.interval)
            .await;
        spinner.finish_and_clear();

        // Remove the probe even when the wait failed.
        if let Err(e) = self
            .client
            .delete_saas_type(project_id, &self.config.region, &probe)
        {
            warn!(error = %e, probe, "SaaS type probe deletion failed, continuing");
            ui::print_warning(&format!("Probe deletion failed (continuing): {e}"));
        }

        waited.context("SaaS Runtime service agent was not provisioned in time")?;
        ui::print_success(&format!("SaaS Runtime service agent ready: {email}"));
        Ok(())
    }

    fn ensure_infra_manager_sa(&self) -> Result<()> {
        let email = self.context.infra_manager_sa()?;
        if self.client.service_account_exists(&self.config.project_id, email)? {
            ui::print_info(&format!("Service account {email} already exists, skipping creation"));
            return Ok(());
        }

        self.client
            .create_service_account(
                &self.config.project_id,
                config::INFRA_MANAGER_ACCOUNT_ID,
                config::INFRA_MANAGER_DISPLAY_NAME,
            )
            .context("Failed to create Infra Manager service account")?;
        ui::print_success(&format!("Service account {email} created"));
        Ok(())
    }

    fn resolve_compute_sa(&mut self) -> Result<()> {
        let default = config::compute_default_email(self.context.project_number()?);

        if self
            .client
            .service_account_exists(&self.config.project_id, &default)?
        {
            ui::print_info(&format!("Using compute default service account: {default}"));
            self.context.compute_sa = Some(default);
            return Ok(());
        }

        let fallback = self.config.fallback_compute_email();
        warn!(default, fallback, "Compute default service account absent");
        ui::print_warning(&format!(
            "Compute default service account absent, falling back to {fallback}"
        ));

        if self
            .client
            .service_account_exists(&self.config.project_id, &fallback)?
        {
            ui::print_info(&format!("Service account {fallback} already exists"));
        } else {
            self.client
                .create_service_account(
                    &self.config.project_id,
                    config::FALLBACK_COMPUTE_ACCOUNT_ID,
                    config::FALLBACK_COMPUTE_DISPLAY_NAME,
                )
                .context("Failed to create fallback compute service account")?;
            ui::print_success(&format!("Service account {fallback} created"));
        }

        self.context.compute_sa = Some(fallback);
        Ok(())
    }

    /// Grant each role in declared order; the control plane treats a
    /// repeat grant as a no-op, so there is no pre-check here.
    fn grant_roles(&self, member: &str, roles: &[&str], label: &str) -> Result<()> {
        ui::print_info(&format!("Granting {} roles to {label} ({member})", roles.len()));
        for role in roles {
            info!(member, role, "Adding IAM binding");
            self.client
                .add_iam_binding(&self.config.project_id, member, role)
                .with_context(|| format!("Failed to grant {role} to {member}"))?;
        }
        Ok(())
    }

    fn ensure_registry(&self) -> Result<()> {
        let name = &self.config.registry_name;
        if self
            .client
            .repository_exists(&self.config.project_id, &self.config.region, name)?
        {
            ui::print_info(&format!("Repository {name} already exists, skipping creation"));
            return Ok(());
        }

        self.client
            .create_repository(
                &self.config.project_id,
                &self.config.region,
                name,
                config::REGISTRY_FORMAT,
                config::REGISTRY_DESCRIPTION,
            )
            .context("Failed to create Artifact Registry repository")?;
        ui::print_success(&format!("Repository {name} created"));
        Ok(())
    }

    fn print_success_summary(&self) {
        ui::print_section("Provisioning complete");
        ui::print_success("SaaS Runtime project is ready.");

        ui::print_kv("Project", &self.config.project_id);
        if let Ok(number) = self.context.project_number() {
            ui::print_kv("Project number", number);
        }
        if let Ok(sa) = self.context.saas_runtime_sa() {
            ui::print_kv("SaaS Runtime agent", sa);
        }
        if let Ok(sa) = self.context.infra_manager_sa() {
            ui::print_kv("Infra Manager", sa);
        }
        if let Ok(sa) = self.context.compute_sa() {
            ui::print_kv("Compute account", sa);
        }
        ui::print_kv("Registry", &self.config.registry_path());
    }
}

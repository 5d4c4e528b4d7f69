//! The `provision` command: gather inputs, validate, run the sequence.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use gcloud::{GcloudBinary, GcloudClient};

use crate::config::{ProvisionConfig, DEFAULT_REGION};
use crate::orchestrator::Provisioner;
use crate::ui;
use crate::validator::{self, PrerequisitesValidator};

/// Provision a Google Cloud project for SaaS Runtime.
#[derive(Args)]
pub struct ProvisionCommand {
    /// Project ID to create or reuse.
    #[arg(long, value_name = "PROJECT_ID")]
    project_id: Option<String>,

    /// Artifact Registry repository name.
    #[arg(long, value_name = "NAME")]
    registry: Option<String>,

    /// Region for the registry and the SaaS-type probe.
    #[arg(long, value_name = "REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// Skip interactive prompts; both --project-id and --registry required.
    #[arg(long)]
    non_interactive: bool,

    /// Skip the confirmation prompt.
    #[arg(short = 'y', long)]
    yes: bool,
}

impl ProvisionCommand {
    /// Run the command.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid input, missing prerequisites, or any
    /// failed provisioning step.
    pub async fn run(self) -> Result<()> {
        ui::print_banner();

        let project_id = self.resolve_value(self.project_id.clone(), "Project ID")?;
        let registry = self.resolve_value(self.registry.clone(), "Registry name")?;

        // Inputs are checked before anything touches the control plane.
        validator::validate_inputs(&project_id, &registry)?;
        let project_id = project_id.trim().to_string();
        let registry = registry.trim().to_string();

        ui::print_kv("Project ID", &project_id);
        ui::print_kv("Registry", &registry);
        ui::print_kv("Region", &self.region);

        let client = GcloudClient::new(GcloudBinary::discover()?);
        PrerequisitesValidator::validate(&client)?;

        if !self.yes && !self.non_interactive {
            let proceed = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(format!("Provision project '{project_id}'?"))
                .default(true)
                .interact()?;
            if !proceed {
                println!("{}", "Provisioning cancelled.".yellow());
                return Ok(());
            }
        }

        let config = ProvisionConfig {
            project_id,
            registry_name: registry,
            region: self.region.clone(),
        };
        let mut provisioner = Provisioner::new(config, client);
        provisioner.run_to_completion().await
    }

    /// Use the flag value when given, otherwise prompt (or fail when
    /// running non-interactively).
    fn resolve_value(&self, flag: Option<String>, label: &str) -> Result<String> {
        if let Some(value) = flag {
            return Ok(value);
        }
        if self.non_interactive {
            bail!("{label} is required in non-interactive mode");
        }

        let value: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(label)
            .allow_empty(true)
            .interact_text()?;
        Ok(value)
    }
}

//! Command execution seam.
//!
//! All control-plane traffic goes through the [`CommandRunner`] trait so the
//! orchestration layer can be exercised without a real gcloud installation.

use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::error::GcloudError;

/// Captured result of one gcloud invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Process exit code, if the process terminated normally.
    pub code: Option<i32>,
    /// Whether the process exited zero.
    pub success: bool,
    /// Captured stdout, lossily decoded.
    pub stdout: String,
    /// Captured stderr, lossily decoded.
    pub stderr: String,
}

/// Executes gcloud argument vectors.
pub trait CommandRunner: Send + Sync {
    /// Run `gcloud <args>` to completion, capturing output.
    ///
    /// A non-zero exit is NOT an error at this level; callers classify it.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be spawned.
    fn run(&self, args: &[String]) -> Result<CommandOutput, GcloudError>;
}

/// Render an argument vector the way it would be typed, for diagnostics.
pub(crate) fn render_command(args: &[String]) -> String {
    format!("gcloud {}", args.join(" "))
}

/// Production runner backed by the real gcloud binary.
pub struct GcloudBinary {
    program: PathBuf,
}

impl GcloudBinary {
    /// Locate the gcloud binary on PATH.
    ///
    /// # Errors
    ///
    /// Returns [`GcloudError::BinaryNotFound`] if the SDK is not installed.
    pub fn discover() -> Result<Self, GcloudError> {
        let program = which::which("gcloud")?;
        debug!(program = %program.display(), "Located gcloud binary");
        Ok(Self { program })
    }
}

impl CommandRunner for GcloudBinary {
    fn run(&self, args: &[String]) -> Result<CommandOutput, GcloudError> {
        debug!(command = %render_command(args), "Invoking gcloud");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| GcloudError::Spawn {
                command: render_command(args),
                source,
            })?;

        let result = CommandOutput {
            code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(
            code = ?result.code,
            success = result.success,
            "gcloud invocation finished"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_command() {
        let args = vec!["projects".to_string(), "describe".to_string(), "p1".to_string()];
        assert_eq!(render_command(&args), "gcloud projects describe p1");
    }
}

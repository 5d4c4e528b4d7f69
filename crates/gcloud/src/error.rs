//! Typed errors for gcloud invocations.

use thiserror::Error;

use crate::runner::CommandOutput;

/// Errors that can occur when driving the gcloud CLI.
#[derive(Error, Debug)]
pub enum GcloudError {
    /// The gcloud binary could not be located on PATH.
    #[error("gcloud not found on PATH - install the Google Cloud SDK")]
    BinaryNotFound(#[from] which::Error),

    /// The process could not be spawned at all.
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A describe call failed because the resource genuinely does not exist.
    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    /// The command exited non-zero for a reason other than absence
    /// (permission, quota, transport, malformed request, ...).
    #[error("`{command}` failed (exit {code:?}): {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The command succeeded but produced output we could not interpret.
    #[error("unexpected output from `{command}`: {detail}")]
    MalformedOutput { command: String, detail: String },

    /// A bounded existence poll expired.
    #[error("timed out after {waited_secs}s waiting for {resource}")]
    Timeout { resource: String, waited_secs: u64 },

    /// Output parsing error.
    #[error("failed to parse gcloud JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stderr fragments gcloud emits when a resource is absent. Anything else
/// on a failed call must propagate as a real failure, never as "create it".
const NOT_FOUND_MARKERS: &[&str] = &[
    "not_found",
    "notfound",
    "not found",
    "does not exist",
    "404",
];

impl GcloudError {
    /// Classify a failed command: genuine absence becomes [`NotFound`],
    /// everything else is a [`CommandFailed`].
    ///
    /// [`NotFound`]: GcloudError::NotFound
    /// [`CommandFailed`]: GcloudError::CommandFailed
    pub(crate) fn classify(command: String, resource: &str, output: &CommandOutput) -> Self {
        let stderr = output.stderr.to_lowercase();
        if NOT_FOUND_MARKERS.iter().any(|m| stderr.contains(m)) {
            Self::NotFound {
                resource: resource.to_string(),
            }
        } else {
            Self::CommandFailed {
                command,
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            }
        }
    }

    /// Whether this error means the resource is absent (as opposed to the
    /// query itself having failed).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            code: Some(1),
            success: false,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_not_found_classification() {
        let out = failed("ERROR: (gcloud.projects.describe) Project [p] not found or permission denied: NOT_FOUND");
        let err = GcloudError::classify("gcloud projects describe p".into(), "project p", &out);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_does_not_exist_classification() {
        let out = failed("ERROR: Service account sa@p.iam.gserviceaccount.com does not exist.");
        let err = GcloudError::classify("gcloud iam service-accounts describe".into(), "sa", &out);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_permission_error_is_not_absence() {
        let out = failed("ERROR: (gcloud.projects.describe) PERMISSION_DENIED: caller lacks resourcemanager.projects.get");
        let err = GcloudError::classify("gcloud projects describe p".into(), "project p", &out);
        assert!(!err.is_not_found());
        assert!(matches!(err, GcloudError::CommandFailed { code: Some(1), .. }));
    }

    #[test]
    fn test_transport_error_is_not_absence() {
        let out = failed("ERROR: gcloud crashed (ConnectionError): connection reset by peer");
        let err = GcloudError::classify("gcloud services enable x".into(), "service x", &out);
        assert!(!err.is_not_found());
    }
}

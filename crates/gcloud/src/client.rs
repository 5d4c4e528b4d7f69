//! High-level gcloud operations used by the provisioner.
//!
//! Existence checks return `Ok(true)` on a successful describe, `Ok(false)`
//! only when the failure is a genuine not-found, and an error for anything
//! else. Creation is therefore only ever triggered by real absence.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::GcloudError;
use crate::runner::{render_command, CommandOutput, CommandRunner};

/// Subset of `gcloud projects describe --format=json` we care about.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectDescription {
    project_number: String,
}

/// Client for the Google Cloud control plane, generic over the runner so
/// tests can script responses.
pub struct GcloudClient<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> GcloudClient<R> {
    /// Wrap a command runner.
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Run a command and classify a non-zero exit.
    fn run_checked(
        &self,
        args: Vec<String>,
        resource: &str,
    ) -> Result<CommandOutput, GcloudError> {
        let output = self.runner.run(&args)?;
        if output.success {
            Ok(output)
        } else {
            Err(GcloudError::classify(
                render_command(&args),
                resource,
                &output,
            ))
        }
    }

    /// Describe-style existence check: absent resources are not errors.
    fn exists(&self, args: Vec<String>, resource: &str) -> Result<bool, GcloudError> {
        match self.run_checked(args, resource) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    // --- SDK / auth ---

    /// First line of `gcloud --version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK is not installed or not working.
    pub fn sdk_version(&self) -> Result<String, GcloudError> {
        let args = vec!["--version".to_string()];
        let output = self.run_checked(args.clone(), "gcloud SDK")?;
        output
            .stdout
            .lines()
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .ok_or_else(|| GcloudError::MalformedOutput {
                command: render_command(&args),
                detail: "empty version output".to_string(),
            })
    }

    /// The currently active gcloud account, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the auth query itself fails.
    pub fn active_account(&self) -> Result<Option<String>, GcloudError> {
        let args = svec([
            "auth",
            "list",
            "--filter=status:ACTIVE",
            "--format=value(account)",
        ]);
        let output = self.run_checked(args, "active account")?;
        let account = output.stdout.trim();
        if account.is_empty() {
            Ok(None)
        } else {
            Ok(Some(account.to_string()))
        }
    }

    // --- Projects ---

    /// Whether the project exists (and is visible to the caller).
    ///
    /// # Errors
    ///
    /// Returns an error if the describe fails for any reason other than
    /// the project being absent.
    pub fn project_exists(&self, project_id: &str) -> Result<bool, GcloudError> {
        let args = svec(["projects", "describe", project_id]);
        self.exists(args, &format!("project {project_id}"))
    }

    /// Create the project.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails.
    pub fn create_project(&self, project_id: &str) -> Result<(), GcloudError> {
        info!(project_id, "Creating project");
        let args = svec(["projects", "create", project_id]);
        self.run_checked(args, &format!("project {project_id}"))?;
        Ok(())
    }

    /// Fetch the numeric project number for a project ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the describe fails or the number is missing
    /// or non-numeric.
    pub fn project_number(&self, project_id: &str) -> Result<String, GcloudError> {
        let args = svec(["projects", "describe", project_id, "--format=json"]);
        let command = render_command(&args);
        let output = self.run_checked(args, &format!("project {project_id}"))?;

        let description: ProjectDescription = serde_json::from_str(&output.stdout)?;
        let number = description.project_number;
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(GcloudError::MalformedOutput {
                command,
                detail: format!("invalid project number {number:?}"),
            });
        }
        debug!(project_id, number, "Resolved project number");
        Ok(number)
    }

    // --- Services ---

    /// Enable one API on the project.
    ///
    /// # Errors
    ///
    /// Returns an error if enablement fails.
    pub fn enable_service(&self, project_id: &str, api: &str) -> Result<(), GcloudError> {
        let args = svec(["services", "enable", api, "--project", project_id]);
        self.run_checked(args, &format!("service {api}"))?;
        Ok(())
    }

    // --- Service accounts ---

    /// Whether a service account with this email exists in the project.
    ///
    /// # Errors
    ///
    /// Returns an error for failures other than genuine absence.
    pub fn service_account_exists(
        &self,
        project_id: &str,
        email: &str,
    ) -> Result<bool, GcloudError> {
        let args = svec([
            "iam",
            "service-accounts",
            "describe",
            email,
            "--project",
            project_id,
        ]);
        self.exists(args, &format!("service account {email}"))
    }

    /// Create a user-managed service account.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails.
    pub fn create_service_account(
        &self,
        project_id: &str,
        account_id: &str,
        display_name: &str,
    ) -> Result<(), GcloudError> {
        info!(project_id, account_id, "Creating service account");
        let args = svec([
            "iam",
            "service-accounts",
            "create",
            account_id,
            "--project",
            project_id,
            "--display-name",
            display_name,
        ]);
        self.run_checked(args, &format!("service account {account_id}"))?;
        Ok(())
    }

    /// Grant one role to a service account at project scope, unconditionally.
    /// Granting an already-held role is a no-op upstream.
    ///
    /// # Errors
    ///
    /// Returns an error if the binding fails.
    pub fn add_iam_binding(
        &self,
        project_id: &str,
        member_email: &str,
        role: &str,
    ) -> Result<(), GcloudError> {
        let args = svec([
            "projects",
            "add-iam-policy-binding",
            project_id,
            "--member",
            &format!("serviceAccount:{member_email}"),
            "--role",
            role,
            "--condition=None",
        ]);
        self.run_checked(args, &format!("binding {role} -> {member_email}"))?;
        Ok(())
    }

    // --- SaaS Runtime ---

    /// Create a SaaS type. Used only as a probe: the SaaS Runtime service
    /// agent is provisioned upstream as a side effect of the first SaaS
    /// resource in a project.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails.
    pub fn create_saas_type(
        &self,
        project_id: &str,
        location: &str,
        name: &str,
    ) -> Result<(), GcloudError> {
        let args = svec([
            "saas-runtime",
            "saas-types",
            "create",
            name,
            "--location",
            location,
            "--project",
            project_id,
        ]);
        self.run_checked(args, &format!("saas type {name}"))?;
        Ok(())
    }

    /// Delete a SaaS type probe.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    pub fn delete_saas_type(
        &self,
        project_id: &str,
        location: &str,
        name: &str,
    ) -> Result<(), GcloudError> {
        let args = svec([
            "saas-runtime",
            "saas-types",
            "delete",
            name,
            "--location",
            location,
            "--project",
            project_id,
            "--quiet",
        ]);
        self.run_checked(args, &format!("saas type {name}"))?;
        Ok(())
    }

    /// Poll until a service account exists, with a hard deadline.
    ///
    /// Replaces open-loop sleeping: either the account shows up within
    /// `timeout` or the caller gets a definitive [`GcloudError::Timeout`].
    ///
    /// # Errors
    ///
    /// Returns an error on timeout or if an existence check fails for a
    /// reason other than absence.
    pub async fn wait_for_service_account(
        &self,
        project_id: &str,
        email: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Result<(), GcloudError> {
        let start = Instant::now();
        info!(
            email,
            timeout_secs = timeout.as_secs(),
            "Waiting for service account to be provisioned"
        );

        loop {
            if self.service_account_exists(project_id, email)? {
                info!(email, "Service account is present");
                return Ok(());
            }

            if start.elapsed() >= timeout {
                return Err(GcloudError::Timeout {
                    resource: format!("service account {email}"),
                    waited_secs: start.elapsed().as_secs(),
                });
            }

            debug!(email, "Service account not present yet, polling again");
            tokio::time::sleep(interval).await;
        }
    }

    // --- Artifact Registry ---

    /// Whether the repository exists in the given location.
    ///
    /// # Errors
    ///
    /// Returns an error for failures other than genuine absence.
    pub fn repository_exists(
        &self,
        project_id: &str,
        location: &str,
        name: &str,
    ) -> Result<bool, GcloudError> {
        let args = svec([
            "artifacts",
            "repositories",
            "describe",
            name,
            "--location",
            location,
            "--project",
            project_id,
        ]);
        self.exists(args, &format!("repository {name}"))
    }

    /// Create an Artifact Registry repository.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails.
    pub fn create_repository(
        &self,
        project_id: &str,
        location: &str,
        name: &str,
        format: &str,
        description: &str,
    ) -> Result<(), GcloudError> {
        info!(project_id, name, location, "Creating Artifact Registry repository");
        let args = svec([
            "artifacts",
            "repositories",
            "create",
            name,
            "--repository-format",
            format,
            "--location",
            location,
            "--description",
            description,
            "--project",
            project_id,
        ]);
        self.run_checked(args, &format!("repository {name}"))?;
        Ok(())
    }
}

/// Build an owned argument vector from string slices.
fn svec<const N: usize>(args: [&str; N]) -> Vec<String> {
    args.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Scripted runner: answers every call with the output produced by a
    /// closure over the argument vector, recording all calls.
    struct FakeRunner {
        calls: Mutex<Vec<Vec<String>>>,
        respond: Box<dyn Fn(&[String]) -> CommandOutput + Send + Sync>,
    }

    impl FakeRunner {
        fn new(respond: impl Fn(&[String]) -> CommandOutput + Send + Sync + 'static) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, args: &[String]) -> Result<CommandOutput, GcloudError> {
            self.calls.lock().unwrap().push(args.to_vec());
            Ok((self.respond)(args))
        }
    }

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            code: Some(0),
            success: true,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            code: Some(1),
            success: false,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_project_exists_true() {
        let client = GcloudClient::new(FakeRunner::new(|_| ok("")));
        assert!(client.project_exists("my-project").unwrap());
    }

    #[test]
    fn test_project_exists_false_on_not_found() {
        let client = GcloudClient::new(FakeRunner::new(|_| {
            failed("ERROR: Project [my-project] not found: NOT_FOUND")
        }));
        assert!(!client.project_exists("my-project").unwrap());
    }

    #[test]
    fn test_project_exists_propagates_other_failures() {
        let client = GcloudClient::new(FakeRunner::new(|_| {
            failed("ERROR: PERMISSION_DENIED: caller cannot describe")
        }));
        let err = client.project_exists("my-project").unwrap_err();
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_project_number_parses_json() {
        let client = GcloudClient::new(FakeRunner::new(|_| {
            ok(r#"{"projectId": "my-project", "projectNumber": "123456789012", "lifecycleState": "ACTIVE"}"#)
        }));
        assert_eq!(client.project_number("my-project").unwrap(), "123456789012");
    }

    #[test]
    fn test_project_number_rejects_non_numeric() {
        let client = GcloudClient::new(FakeRunner::new(|_| {
            ok(r#"{"projectNumber": "abc"}"#)
        }));
        let err = client.project_number("my-project").unwrap_err();
        assert!(matches!(err, GcloudError::MalformedOutput { .. }));
    }

    #[test]
    fn test_add_iam_binding_member_formatting() {
        let runner = FakeRunner::new(|_| ok(""));
        let client = GcloudClient::new(runner);
        client
            .add_iam_binding("my-project", "sa@my-project.iam.gserviceaccount.com", "roles/viewer")
            .unwrap();

        let calls = client.runner.calls.lock().unwrap();
        let args = &calls[0];
        assert!(args.contains(&"serviceAccount:sa@my-project.iam.gserviceaccount.com".to_string()));
        assert!(args.contains(&"roles/viewer".to_string()));
        assert!(args.contains(&"--condition=None".to_string()));
    }

    #[test]
    fn test_active_account_empty_is_none() {
        let client = GcloudClient::new(FakeRunner::new(|_| ok("\n")));
        assert_eq!(client.active_account().unwrap(), None);
    }

    #[tokio::test]
    async fn test_wait_for_service_account_succeeds_once_present() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let polls = Arc::new(AtomicUsize::new(0));
        let polls_in_responder = Arc::clone(&polls);
        let client = GcloudClient::new(FakeRunner::new(move |_| {
            if polls_in_responder.fetch_add(1, Ordering::SeqCst) < 2 {
                failed("NOT_FOUND")
            } else {
                ok("")
            }
        }));

        client
            .wait_for_service_account(
                "my-project",
                "sa@my-project.iam.gserviceaccount.com",
                Duration::from_secs(5),
                Duration::ZERO,
            )
            .await
            .unwrap();
        assert!(client.runner.call_count() >= 3);
    }

    #[tokio::test]
    async fn test_wait_for_service_account_times_out() {
        let client = GcloudClient::new(FakeRunner::new(|_| failed("NOT_FOUND")));
        let err = client
            .wait_for_service_account(
                "my-project",
                "sa@my-project.iam.gserviceaccount.com",
                Duration::ZERO,
                Duration::ZERO,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GcloudError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_wait_for_service_account_propagates_query_errors() {
        let client = GcloudClient::new(FakeRunner::new(|_| {
            failed("ERROR: PERMISSION_DENIED")
        }));
        let err = client
            .wait_for_service_account(
                "my-project",
                "sa@my-project.iam.gserviceaccount.com",
                Duration::from_secs(5),
                Duration::ZERO,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GcloudError::CommandFailed { .. }));
    }
}

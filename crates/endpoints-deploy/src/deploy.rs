// crates/endpoints-deploy/src/deploy.rs
// ============================================================================
// Module: Deployment Runner
// Description: Bounded, retried execution of the external deploy command.
// Purpose: Ship the working copy to App Engine and report its base URL.
// Dependencies: tokio, reqwest, async-trait, thiserror
// ============================================================================

//! ## Overview
//! [`run_with_retry`] executes a [`DeployCommand`] until it succeeds or the
//! [`RetryPolicy`] budget is spent. Each attempt is bounded by whatever budget
//! remains. On unix each attempt leads its own process group, and an attempt
//! that overruns has the whole group killed, so helpers spawned by a wrapper
//! script such as `gcloud` die with it. Elsewhere only the direct child is
//! killed. Command output is only inspected for success or failure.
//!
//! [`Deployer`] is the seam the harness calls. [`GcloudDeployer`] is the
//! production strategy: `gcloud -q beta app deploy --no-promote` for setup and
//! `gcloud -q app versions delete` for teardown.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::sleep;
use tokio::time::timeout;

use crate::audit::EventOutcome;
use crate::audit::HarnessEvent;
use crate::audit::HarnessEventSink;
use crate::audit::HarnessPhase;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Total budget for the deploy command across all attempts.
pub const DEPLOY_TIMEOUT: Duration = Duration::from_secs(60 * 60);
/// Total budget for deleting the deployed version.
pub const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Pause between failed attempts.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(10);
/// Default deployment CLI binary.
pub const GCLOUD_PROGRAM: &str = "gcloud";
/// Maximum bytes of stderr kept in failure messages.
const STDERR_TAIL_BYTES: usize = 2048;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Deployment failures.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The command never succeeded within the retry budget.
    #[error(
        "`{command}` did not succeed within {budget_secs}s after {attempts} attempt(s): {last_failure}"
    )]
    DeploymentFailed {
        /// Rendered command line.
        command: String,
        /// Attempts started.
        attempts: u32,
        /// Configured budget in seconds.
        budget_secs: u64,
        /// Wall time spent.
        elapsed: Duration,
        /// Description of the final failed attempt.
        last_failure: String,
    },
    /// The deployment target does not form a valid service URL.
    #[error("invalid deployment target {project_id}/{version_id}: {reason}")]
    InvalidTarget {
        /// Project identifier.
        project_id: String,
        /// Version identifier.
        version_id: String,
        /// Parse failure.
        reason: String,
    },
}

/// Why a single attempt failed.
#[derive(Debug, Error)]
enum AttemptFailure {
    /// The process could not be started.
    #[error("spawn failed: {0}")]
    Spawn(io::Error),
    /// Waiting on the process failed.
    #[error("wait failed: {0}")]
    Wait(io::Error),
    /// The attempt overran the remaining budget and was killed.
    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),
    /// The process exited unsuccessfully.
    #[error("exited with {status}: {stderr}")]
    Exit {
        /// Exit status description.
        status: String,
        /// Tail of captured stderr.
        stderr: String,
    },
}

// ============================================================================
// SECTION: Retry Policy
// ============================================================================

/// Retry-until-timeout policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total wall-clock budget across attempts.
    pub budget: Duration,
    /// Pause between failed attempts, clamped to the remaining budget.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Builds a policy from an explicit budget and backoff.
    #[must_use]
    pub const fn new(budget: Duration, backoff: Duration) -> Self {
        Self {
            budget,
            backoff,
        }
    }

    /// Policy for the deploy command (one hour).
    #[must_use]
    pub const fn deployment() -> Self {
        Self::new(DEPLOY_TIMEOUT, RETRY_BACKOFF)
    }

    /// Policy for version deletion.
    #[must_use]
    pub const fn teardown() -> Self {
        Self::new(TEARDOWN_TIMEOUT, RETRY_BACKOFF)
    }
}

// ============================================================================
// SECTION: Command
// ============================================================================

/// External command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployCommand {
    /// Program to execute.
    program: String,
    /// Program arguments.
    args: Vec<String>,
    /// Working directory; inherits the caller's when `None`.
    current_dir: Option<PathBuf>,
}

impl DeployCommand {
    /// Creates a command with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// `<gcloud> -q beta app deploy --project <id> --version <id> --no-promote`.
    #[must_use]
    pub fn app_deploy(program: &str, target: &DeploymentTarget, working_dir: &Path) -> Self {
        Self::new(program)
            .arg("-q")
            .arg("beta")
            .arg("app")
            .arg("deploy")
            .arg("--project")
            .arg(target.project_id.as_str())
            .arg("--version")
            .arg(target.version_id.as_str())
            .arg("--no-promote")
            .current_dir(working_dir)
    }

    /// `<gcloud> -q app versions delete <id> --service default --project <id>`.
    #[must_use]
    pub fn version_delete(program: &str, target: &DeploymentTarget) -> Self {
        Self::new(program)
            .arg("-q")
            .arg("app")
            .arg("versions")
            .arg("delete")
            .arg(target.version_id.as_str())
            .arg("--service")
            .arg("default")
            .arg("--project")
            .arg(target.project_id.as_str())
    }

    /// Returns the program.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the working directory, if set.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }
}

impl fmt::Display for DeployCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Runs `command` until it succeeds or `policy.budget` is spent.
///
/// Returns the number of attempts used on success.
///
/// # Errors
///
/// Returns [`DeployError::DeploymentFailed`] when no attempt succeeds within
/// the budget.
pub async fn run_with_retry(
    command: &DeployCommand,
    policy: RetryPolicy,
    phase: HarnessPhase,
    sink: &dyn HarnessEventSink,
) -> Result<u32, DeployError> {
    let start = Instant::now();
    let mut attempts = 0u32;
    let mut last_failure = String::from("no attempt started");
    while let Some(remaining) = remaining_budget(policy.budget, start) {
        attempts = attempts.saturating_add(1);
        sink.record(
            &HarnessEvent::new(phase, EventOutcome::Started)
                .with_attempt(attempts)
                .with_message(command.to_string()),
        );
        match run_once(command, remaining).await {
            Ok(()) => {
                sink.record(&HarnessEvent::new(phase, EventOutcome::Ok).with_attempt(attempts));
                return Ok(attempts);
            }
            Err(failure) => {
                last_failure = failure.to_string();
                sink.record(
                    &HarnessEvent::new(phase, EventOutcome::Error)
                        .with_attempt(attempts)
                        .with_message(last_failure.clone()),
                );
            }
        }
        let Some(remaining) = remaining_budget(policy.budget, start) else {
            break;
        };
        sleep(policy.backoff.min(remaining)).await;
    }
    Err(DeployError::DeploymentFailed {
        command: command.to_string(),
        attempts,
        budget_secs: policy.budget.as_secs(),
        elapsed: start.elapsed(),
        last_failure,
    })
}

/// Budget left since `start`, or `None` once it is spent.
fn remaining_budget(budget: Duration, start: Instant) -> Option<Duration> {
    budget.checked_sub(start.elapsed()).filter(|remaining| !remaining.is_zero())
}

/// Executes one attempt bounded by `limit`.
async fn run_once(command: &DeployCommand, limit: Duration) -> Result<(), AttemptFailure> {
    let mut process = Command::new(&command.program);
    process
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    process.process_group(0);
    if let Some(dir) = &command.current_dir {
        process.current_dir(dir);
    }
    let child = process.spawn().map_err(AttemptFailure::Spawn)?;
    let group = child.id();
    let output = match timeout(limit, child.wait_with_output()).await {
        Err(_) => {
            kill_process_group(group).await;
            return Err(AttemptFailure::TimedOut(limit));
        }
        Ok(result) => result.map_err(AttemptFailure::Wait)?,
    };
    if output.status.success() {
        return Ok(());
    }
    Err(AttemptFailure::Exit {
        status: output.status.to_string(),
        stderr: stderr_tail(&output.stderr),
    })
}

/// Sends `SIGKILL` to every process in the attempt's group.
#[cfg(unix)]
async fn kill_process_group(group: Option<u32>) {
    let Some(group) = group else {
        return;
    };
    let _ = Command::new("kill")
        .arg("-KILL")
        .arg("--")
        .arg(format!("-{group}"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
}

/// Without process groups the dropped child is the only one killed.
#[cfg(not(unix))]
async fn kill_process_group(_group: Option<u32>) {}

/// Keeps the last [`STDERR_TAIL_BYTES`] of stderr, trimmed.
fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}

/// Sleeps for the configured propagation delay, if any.
///
/// Returns whether a pause happened.
pub async fn wait_for_propagation(delay: Option<Duration>, sink: &dyn HarnessEventSink) -> bool {
    let Some(delay) = delay.filter(|delay| !delay.is_zero()) else {
        return false;
    };
    sink.record(
        &HarnessEvent::new(HarnessPhase::Delay, EventOutcome::Started)
            .with_message(format!("sleeping {}s", delay.as_secs())),
    );
    sleep(delay).await;
    sink.record(&HarnessEvent::new(HarnessPhase::Delay, EventOutcome::Ok));
    true
}

// ============================================================================
// SECTION: Deployer Strategy
// ============================================================================

/// App Engine project and version receiving the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    /// Project identifier.
    pub project_id: String,
    /// Version identifier.
    pub version_id: String,
}

impl DeploymentTarget {
    /// Creates a target.
    #[must_use]
    pub fn new(project_id: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            version_id: version_id.into(),
        }
    }

    /// Version-specific URL: `https://<version>-dot-<project>.appspot.com`.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::InvalidTarget`] when the ids do not form a URL.
    pub fn base_url(&self) -> Result<Url, DeployError> {
        let raw = format!("https://{}-dot-{}.appspot.com", self.version_id, self.project_id);
        Url::parse(&raw).map_err(|err| DeployError::InvalidTarget {
            project_id: self.project_id.clone(),
            version_id: self.version_id.clone(),
            reason: err.to_string(),
        })
    }
}

/// Generates a version id when none is configured.
#[must_use]
pub fn default_version_id() -> String {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    format!("endpoints-{secs}")
}

/// Inputs for a single deployment.
#[derive(Debug, Clone, Copy)]
pub struct DeploymentRequest<'a> {
    /// Project and version.
    pub target: &'a DeploymentTarget,
    /// Templated working copy to upload.
    pub working_dir: &'a Path,
}

/// Deployment strategy invoked by the harness.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Deploys the working copy and returns the service base URL.
    async fn deploy(
        &self,
        request: DeploymentRequest<'_>,
        sink: &dyn HarnessEventSink,
    ) -> Result<Url, DeployError>;

    /// Removes the deployed version.
    async fn teardown(
        &self,
        _target: &DeploymentTarget,
        _sink: &dyn HarnessEventSink,
    ) -> Result<(), DeployError> {
        Ok(())
    }
}

/// Deploys with the Cloud SDK CLI.
#[derive(Debug, Clone)]
pub struct GcloudDeployer {
    /// CLI binary.
    program: String,
    /// Budget for `app deploy`.
    deploy_policy: RetryPolicy,
    /// Budget for `app versions delete`.
    teardown_policy: RetryPolicy,
}

impl Default for GcloudDeployer {
    fn default() -> Self {
        Self::new()
    }
}

impl GcloudDeployer {
    /// Uses `gcloud` from `PATH` with the standard budgets.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: GCLOUD_PROGRAM.to_string(),
            deploy_policy: RetryPolicy::deployment(),
            teardown_policy: RetryPolicy::teardown(),
        }
    }

    /// Overrides the CLI binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Overrides the deploy budget.
    #[must_use]
    pub const fn with_deploy_policy(mut self, policy: RetryPolicy) -> Self {
        self.deploy_policy = policy;
        self
    }

    /// Overrides the teardown budget.
    #[must_use]
    pub const fn with_teardown_policy(mut self, policy: RetryPolicy) -> Self {
        self.teardown_policy = policy;
        self
    }
}

#[async_trait]
impl Deployer for GcloudDeployer {
    async fn deploy(
        &self,
        request: DeploymentRequest<'_>,
        sink: &dyn HarnessEventSink,
    ) -> Result<Url, DeployError> {
        let base_url = request.target.base_url()?;
        let command = DeployCommand::app_deploy(&self.program, request.target, request.working_dir);
        run_with_retry(&command, self.deploy_policy, HarnessPhase::Deploy, sink).await?;
        Ok(base_url)
    }

    async fn teardown(
        &self,
        target: &DeploymentTarget,
        sink: &dyn HarnessEventSink,
    ) -> Result<(), DeployError> {
        let command = DeployCommand::version_delete(&self.program, target);
        run_with_retry(&command, self.teardown_policy, HarnessPhase::Teardown, sink).await?;
        Ok(())
    }
}

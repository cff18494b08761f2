// crates/endpoints-deploy/src/harness.rs
// ============================================================================
// Module: Deployment Harness
// Description: Before-all orchestration for the echo deployment suite.
// Purpose: Decide skip vs. run, prepare the working copy, deploy, and probe.
// Dependencies: reqwest, tokio, crate modules
// ============================================================================

//! ## Overview
//! The harness is a two-state machine: [`SuiteState::Skipped`] (terminal) or
//! [`SuiteState::Running`]. Setup runs in two phases with separate gates:
//!
//! 1. Class setup: `RUN_DEPLOYMENT_TESTS=true` and an API key.
//! 2. Deploy hook: project id, then client id and service account email. Only
//!    after both pass is the source cloned, templated and deployed.
//!
//! Missing configuration skips; deployment and probe failures are errors.
//! The harness owns its HTTP client and event sink; nothing is process-global.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use crate::audit::EventOutcome;
use crate::audit::FileEventSink;
use crate::audit::HarnessEvent;
use crate::audit::HarnessEventSink;
use crate::audit::HarnessPhase;
use crate::audit::StderrEventSink;
use crate::config::ConfigError;
use crate::config::DeploymentSettings;
use crate::deploy::DeployError;
use crate::deploy::Deployer;
use crate::deploy::DeploymentRequest;
use crate::deploy::DeploymentTarget;
use crate::deploy::default_version_id;
use crate::deploy::wait_for_propagation;
use crate::probe::EchoProbe;
use crate::probe::ProbeError;
use crate::template::ConfigTemplater;
use crate::template::DEFAULT_DOCUMENTS;
use crate::template::PlaceholderValues;
use crate::template::TemplateError;
use crate::workspace::WorkingCopy;
use crate::workspace::WorkspaceError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Per-request timeout for the probe client.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
/// User agent for probe requests.
const USER_AGENT: &str = "endpoints-deploy/0.1";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal harness failures.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Environment values are malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The event log could not be opened.
    #[error("failed to open event log {path}: {source}")]
    EventLog {
        /// Log path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    HttpClient(reqwest::Error),
    /// Cloning the source tree failed.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    /// Templating the working copy failed.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// Deployment or teardown failed.
    #[error(transparent)]
    Deploy(#[from] DeployError),
    /// The echo probe failed.
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

// ============================================================================
// SECTION: Suite State
// ============================================================================

/// Why the suite was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `RUN_DEPLOYMENT_TESTS` is not `true`.
    DeploymentTestsDisabled,
    /// `GOOGLE_ENDPOINTS_APIKEY` is not set.
    MissingApiKey,
    /// `GOOGLE_PROJECT_ID` is not set.
    MissingProjectId,
    /// `GOOGLE_CLIENT_ID` or `GOOGLE_SERVICE_ACCOUNT_EMAIL` is not set.
    MissingIdentity,
}

impl SkipReason {
    /// Phase that produced the skip.
    #[must_use]
    pub const fn phase(self) -> HarnessPhase {
        match self {
            Self::DeploymentTestsDisabled | Self::MissingApiKey => HarnessPhase::ClassSetup,
            Self::MissingProjectId | Self::MissingIdentity => HarnessPhase::PrepareWorkspace,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::DeploymentTestsDisabled => {
                "To run this test, set RUN_DEPLOYMENT_TESTS env to \"true\"."
            }
            Self::MissingApiKey => "Set the GOOGLE_ENDPOINTS_APIKEY environment variable",
            Self::MissingProjectId => "Set the GOOGLE_PROJECT_ID environment variable",
            Self::MissingIdentity => {
                "Please set GOOGLE_CLIENT_ID, GOOGLE_PROJECT_ID and GOOGLE_SERVICE_ACCOUNT_EMAIL"
            }
        };
        f.write_str(message)
    }
}

/// Outcome of the before-all phase.
pub enum SuiteState<D> {
    /// Terminal: required configuration is absent.
    Skipped(SkipReason),
    /// Deployed and ready to probe.
    Running(RunningSuite<D>),
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Before-all orchestration for one deployment scenario.
pub struct DeploymentHarness<D> {
    /// Settings resolved at construction.
    settings: DeploymentSettings,
    /// Deployment strategy.
    deployer: D,
    /// Event sink owned by this harness.
    sink: Arc<dyn HarnessEventSink>,
    /// HTTP client owned by this harness.
    client: Client,
    /// Checked-in application source directory.
    source_dir: PathBuf,
    /// Documents templated inside the working copy.
    documents: Vec<PathBuf>,
}

impl<D: Deployer> DeploymentHarness<D> {
    /// Creates a harness from explicit settings.
    ///
    /// Events go to `settings.event_log` when set, stderr otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the event log cannot be opened or the
    /// HTTP client cannot be built.
    pub fn new(
        settings: DeploymentSettings,
        deployer: D,
        source_dir: impl Into<PathBuf>,
    ) -> Result<Self, HarnessError> {
        let sink: Arc<dyn HarnessEventSink> = match &settings.event_log {
            Some(path) => {
                Arc::new(FileEventSink::new(path).map_err(|source| HarnessError::EventLog {
                    path: path.clone(),
                    source,
                })?)
            }
            None => Arc::new(StderrEventSink),
        };
        let client = Client::builder()
            .timeout(PROBE_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(HarnessError::HttpClient)?;
        Ok(Self {
            settings,
            deployer,
            sink,
            client,
            source_dir: source_dir.into(),
            documents: DEFAULT_DOCUMENTS.iter().map(PathBuf::from).collect(),
        })
    }

    /// Creates a harness from the process environment.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`DeploymentHarness::new`]. Malformed values
    /// surface from [`DeploymentHarness::set_up_before_all`] once the gates pass.
    pub fn from_env(deployer: D, source_dir: impl Into<PathBuf>) -> Result<Self, HarnessError> {
        Self::new(DeploymentSettings::load(), deployer, source_dir)
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn HarnessEventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replaces the templated document list.
    #[must_use]
    pub fn with_documents<I, P>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.documents = documents.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the resolved settings.
    #[must_use]
    pub const fn settings(&self) -> &DeploymentSettings {
        &self.settings
    }

    /// Class-level gate: the enabling flag and the API key.
    ///
    /// # Errors
    ///
    /// Returns the [`SkipReason`] when the suite must not run.
    pub fn class_gate(&self) -> Result<&str, SkipReason> {
        if !self.settings.run_deployment_tests {
            return Err(SkipReason::DeploymentTestsDisabled);
        }
        self.settings.api_key.as_deref().ok_or(SkipReason::MissingApiKey)
    }

    /// Deploy-hook gate: project id, then the OAuth identity values.
    ///
    /// # Errors
    ///
    /// Returns the [`SkipReason`] when deployment inputs are absent.
    pub fn deploy_gate(&self) -> Result<(DeploymentTarget, PlaceholderValues), SkipReason> {
        let project_id = self.settings.project_id.as_deref().ok_or(SkipReason::MissingProjectId)?;
        let (Some(client_id), Some(service_account_email)) =
            (self.settings.client_id.as_deref(), self.settings.service_account_email.as_deref())
        else {
            return Err(SkipReason::MissingIdentity);
        };
        let version_id = self.settings.version_id.clone().unwrap_or_else(default_version_id);
        Ok((
            DeploymentTarget::new(project_id, version_id),
            PlaceholderValues::new(project_id, client_id, service_account_email),
        ))
    }

    /// Runs both setup phases and deploys when every gate passes.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when cloning, templating or deployment fails,
    /// or [`HarnessError::Config`] when a value the running suite needs is
    /// malformed. Missing configuration is reported as [`SuiteState::Skipped`]
    /// instead, whatever the other values hold.
    pub async fn set_up_before_all(self) -> Result<SuiteState<D>, HarnessError> {
        let api_key = match self.class_gate() {
            Ok(api_key) => api_key.to_string(),
            Err(reason) => return Ok(self.skip(reason)),
        };
        self.sink.record(&HarnessEvent::new(HarnessPhase::ClassSetup, EventOutcome::Ok));

        let (target, values) = match self.deploy_gate() {
            Ok(inputs) => inputs,
            Err(reason) => return Ok(self.skip(reason)),
        };
        self.settings.check_encoding()?;
        let delay = self.settings.propagation_delay()?;
        self.sink.record(
            &HarnessEvent::new(HarnessPhase::PrepareWorkspace, EventOutcome::Started)
                .with_message(self.source_dir.display().to_string()),
        );
        let working_copy = WorkingCopy::clone_from(&self.source_dir)?;
        ConfigTemplater::new(values)
            .with_documents(self.documents.iter().cloned())
            .apply(working_copy.path())?;
        self.sink.record(
            &HarnessEvent::new(HarnessPhase::PrepareWorkspace, EventOutcome::Ok)
                .with_message(working_copy.path().display().to_string()),
        );

        let base_url = self
            .deployer
            .deploy(
                DeploymentRequest {
                    target: &target,
                    working_dir: working_copy.path(),
                },
                self.sink.as_ref(),
            )
            .await?;
        wait_for_propagation(delay, self.sink.as_ref()).await;

        Ok(SuiteState::Running(RunningSuite {
            probe: EchoProbe::new(self.client, base_url, api_key),
            deployer: self.deployer,
            sink: self.sink,
            working_copy,
            target,
            keep_deployment: self.settings.keep_deployment,
        }))
    }

    /// Records the skip and returns the terminal state.
    fn skip(&self, reason: SkipReason) -> SuiteState<D> {
        self.sink.record(
            &HarnessEvent::new(reason.phase(), EventOutcome::Skipped).with_message(reason.to_string()),
        );
        SuiteState::Skipped(reason)
    }
}

// ============================================================================
// SECTION: Running Suite
// ============================================================================

/// A deployed service plus the resources that must outlive the scenario.
pub struct RunningSuite<D> {
    /// Probe bound to the deployed base URL.
    probe: EchoProbe,
    /// Strategy used for teardown.
    deployer: D,
    /// Event sink.
    sink: Arc<dyn HarnessEventSink>,
    /// Templated working copy; removed on drop.
    working_copy: WorkingCopy,
    /// Deployed project and version.
    target: DeploymentTarget,
    /// Skip teardown when set.
    keep_deployment: bool,
}

impl<D: Deployer> RunningSuite<D> {
    /// Returns the probe.
    #[must_use]
    pub const fn probe(&self) -> &EchoProbe {
        &self.probe
    }

    /// Returns the deployed target.
    #[must_use]
    pub const fn target(&self) -> &DeploymentTarget {
        &self.target
    }

    /// Returns the working copy root.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        self.working_copy.path()
    }

    /// Runs the echo scenario and records its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Probe`] on transport failure or mismatch.
    pub async fn assert_echo(&self, message: &str) -> Result<(), HarnessError> {
        self.sink.record(&HarnessEvent::new(HarnessPhase::Probe, EventOutcome::Started));
        match self.probe.assert_echo(message).await {
            Ok(()) => {
                self.sink.record(&HarnessEvent::new(HarnessPhase::Probe, EventOutcome::Ok));
                Ok(())
            }
            Err(err) => {
                self.sink.record(
                    &HarnessEvent::new(HarnessPhase::Probe, EventOutcome::Error)
                        .with_message(err.to_string()),
                );
                Err(err.into())
            }
        }
    }

    /// Deletes the deployed version unless `GOOGLE_KEEP_DEPLOYMENT=true`.
    ///
    /// Returns whether teardown ran.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Deploy`] when deletion fails.
    pub async fn tear_down(self) -> Result<bool, HarnessError> {
        if self.keep_deployment {
            self.sink.record(
                &HarnessEvent::new(HarnessPhase::Teardown, EventOutcome::Skipped)
                    .with_message(format!("keeping version {}", self.target.version_id)),
            );
            return Ok(false);
        }
        self.deployer.teardown(&self.target, self.sink.as_ref()).await?;
        Ok(true)
    }
}

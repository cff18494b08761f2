// crates/endpoints-deploy/src/config/env.rs
// ============================================================================
// Module: Deployment Environment
// Description: Environment-backed configuration for the deployment harness.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: std, thiserror
// ============================================================================

//! ## Overview
//! Environment values are read with UTF-8 enforcement to avoid silent
//! misconfiguration. Empty or whitespace-only values count as absent, so an
//! exported-but-blank credential skips the suite instead of deploying with it.
//! Values that are present but malformed fail closed once the gates pass;
//! loading itself never fails, so an unset gate flag always skips.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Environment keys read by the deployment harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentEnv {
    /// Gate flag; must equal `true` for the suite to run.
    RunDeploymentTests,
    /// API key appended to probe requests.
    EndpointsApiKey,
    /// Google Cloud project that receives the deployment.
    ProjectId,
    /// OAuth client identifier substituted into the Endpoints config.
    ClientId,
    /// Service account email substituted into the Endpoints config.
    ServiceAccountEmail,
    /// Optional App Engine version identifier.
    VersionId,
    /// Optional post-deploy delay in whole seconds.
    DeploymentDelay,
    /// Keep the deployed version after the suite (`true` only).
    KeepDeployment,
    /// Optional path for JSON-line harness events.
    EventLog,
}

impl DeploymentEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunDeploymentTests => "RUN_DEPLOYMENT_TESTS",
            Self::EndpointsApiKey => "GOOGLE_ENDPOINTS_APIKEY",
            Self::ProjectId => "GOOGLE_PROJECT_ID",
            Self::ClientId => "GOOGLE_CLIENT_ID",
            Self::ServiceAccountEmail => "GOOGLE_SERVICE_ACCOUNT_EMAIL",
            Self::VersionId => "GOOGLE_VERSION_ID",
            Self::DeploymentDelay => "GOOGLE_DEPLOYMENT_DELAY",
            Self::KeepDeployment => "GOOGLE_KEEP_DEPLOYMENT",
            Self::EventLog => "ENDPOINTS_DEPLOY_EVENT_LOG",
        }
    }

    /// Every variable the harness reads, in lookup order.
    pub const ALL: [Self; 9] = [
        Self::RunDeploymentTests,
        Self::EndpointsApiKey,
        Self::ProjectId,
        Self::ClientId,
        Self::ServiceAccountEmail,
        Self::VersionId,
        Self::DeploymentDelay,
        Self::KeepDeployment,
        Self::EventLog,
    ];
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors for malformed environment values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Variable is set but not valid UTF-8.
    #[error("{name} must be valid UTF-8")]
    InvalidUtf8 {
        /// Variable name.
        name: &'static str,
    },
    /// Delay is set but not a non-negative integer number of seconds.
    #[error("{name} must be a non-negative integer number of seconds, got `{value}`")]
    InvalidDelay {
        /// Variable name.
        name: &'static str,
        /// Raw value as read.
        value: String,
    },
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Typed deployment settings derived from environment variables.
///
/// Loading never fails: values that only matter once the suite runs are kept
/// raw and validated by [`DeploymentSettings::propagation_delay`] and
/// [`DeploymentSettings::check_encoding`], so an unset gate always skips.
///
/// # Invariants
/// - Optional strings are never empty or whitespace-only.
/// - `deployment_delay` holds the delay exactly as exported.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeploymentSettings {
    /// Whether `RUN_DEPLOYMENT_TESTS` equals `true`.
    pub run_deployment_tests: bool,
    /// Endpoints API key.
    pub api_key: Option<String>,
    /// Target project identifier.
    pub project_id: Option<String>,
    /// OAuth client identifier.
    pub client_id: Option<String>,
    /// Service account email.
    pub service_account_email: Option<String>,
    /// Explicit version identifier.
    pub version_id: Option<String>,
    /// Raw pause, in seconds, between deploy completion and the first probe.
    pub deployment_delay: Option<String>,
    /// Keep the deployed version instead of deleting it on teardown.
    pub keep_deployment: bool,
    /// Destination for JSON-line harness events.
    pub event_log: Option<PathBuf>,
    /// Variables that were set but not valid UTF-8, in lookup order.
    pub unreadable: Vec<&'static str>,
}

impl DeploymentSettings {
    /// Loads settings from environment variables.
    ///
    /// Non-UTF-8 values load as absent and are recorded in `unreadable`.
    #[must_use]
    pub fn load() -> Self {
        let mut unreadable = Vec::new();
        let run_deployment_tests =
            flag_enabled(read_env_lenient(DeploymentEnv::RunDeploymentTests, &mut unreadable));
        let api_key = read_env_present(DeploymentEnv::EndpointsApiKey, &mut unreadable);
        let project_id = read_env_present(DeploymentEnv::ProjectId, &mut unreadable);
        let client_id = read_env_present(DeploymentEnv::ClientId, &mut unreadable);
        let service_account_email =
            read_env_present(DeploymentEnv::ServiceAccountEmail, &mut unreadable);
        let version_id = read_env_present(DeploymentEnv::VersionId, &mut unreadable);
        let deployment_delay = read_env_present(DeploymentEnv::DeploymentDelay, &mut unreadable);
        let keep_deployment =
            flag_enabled(read_env_lenient(DeploymentEnv::KeepDeployment, &mut unreadable));
        let event_log =
            read_env_present(DeploymentEnv::EventLog, &mut unreadable).map(PathBuf::from);
        Self {
            run_deployment_tests,
            api_key,
            project_id,
            client_id,
            service_account_email,
            version_id,
            deployment_delay,
            keep_deployment,
            event_log,
            unreadable,
        }
    }

    /// Parses the post-deploy delay; zero or unset means no pause.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDelay`] when the value is not a
    /// non-negative integer.
    pub fn propagation_delay(&self) -> Result<Option<Duration>, ConfigError> {
        self.deployment_delay.as_deref().map_or(Ok(None), |raw| {
            parse_delay_seconds(DeploymentEnv::DeploymentDelay.as_str(), raw)
        })
    }

    /// Fails on the first variable that was set but not valid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUtf8`] naming that variable.
    pub fn check_encoding(&self) -> Result<(), ConfigError> {
        self.unreadable.first().copied().map_or(Ok(()), |name| {
            Err(ConfigError::InvalidUtf8 {
                name,
            })
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidUtf8`] when the variable contains invalid UTF-8.
pub fn read_env_strict(env: DeploymentEnv) -> Result<Option<String>, ConfigError> {
    let name = env.as_str();
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string().map(Some).map_err(|_| ConfigError::InvalidUtf8 {
            name,
        })
    })
}

/// Reads an environment variable, recording non-UTF-8 values as unreadable.
fn read_env_lenient(env: DeploymentEnv, unreadable: &mut Vec<&'static str>) -> Option<String> {
    match read_env_strict(env) {
        Ok(value) => value,
        Err(ConfigError::InvalidUtf8 {
            name,
        }) => {
            unreadable.push(name);
            None
        }
        Err(ConfigError::InvalidDelay {
            ..
        }) => None,
    }
}

/// Reads an environment variable, treating blank values as absent.
fn read_env_present(env: DeploymentEnv, unreadable: &mut Vec<&'static str>) -> Option<String> {
    read_env_lenient(env, unreadable).filter(|value| !value.trim().is_empty())
}

/// Returns true only when the value equals the literal `true`.
fn flag_enabled(value: Option<String>) -> bool {
    value.as_deref() == Some("true")
}

/// Parses a delay in whole seconds; zero maps to no delay.
fn parse_delay_seconds(name: &'static str, raw: &str) -> Result<Option<Duration>, ConfigError> {
    let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidDelay {
        name,
        value: raw.to_string(),
    })?;
    if secs == 0 {
        return Ok(None);
    }
    Ok(Some(Duration::from_secs(secs)))
}

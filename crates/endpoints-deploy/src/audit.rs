// crates/endpoints-deploy/src/audit.rs
// ============================================================================
// Module: Harness Event Logging
// Description: Structured events for each deployment harness phase.
// Purpose: Emit JSON-line logs without hard dependencies on a logging stack.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The harness reports skip decisions, setup steps, deploy attempts and probe
//! outcomes as [`HarnessEvent`] values. Sinks decide where the JSON lines go:
//! stderr, an append-only file, or nowhere.
//! Events never carry the API key or the OAuth identity values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Harness phase an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HarnessPhase {
    /// Class-level gate checks.
    ClassSetup,
    /// Deploy hook prerequisites and working copy preparation.
    PrepareWorkspace,
    /// External deployment command.
    Deploy,
    /// Post-deploy propagation delay.
    Delay,
    /// Echo endpoint probe.
    Probe,
    /// Version deletion after the suite.
    Teardown,
}

/// Event outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// Step started.
    Started,
    /// Step completed.
    Ok,
    /// Suite skipped at this step.
    Skipped,
    /// Step failed; may be retried.
    Error,
}

/// Harness event payload.
#[derive(Debug, Clone, Serialize)]
pub struct HarnessEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Harness phase.
    pub phase: HarnessPhase,
    /// Step outcome.
    pub outcome: EventOutcome,
    /// Attempt number for retried steps.
    pub attempt: Option<u32>,
    /// Human-readable detail.
    pub message: Option<String>,
}

impl HarnessEvent {
    /// Creates a new harness event with a consistent timestamp.
    #[must_use]
    pub fn new(phase: HarnessPhase, outcome: EventOutcome) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "deploy_harness",
            timestamp_ms,
            phase,
            outcome,
            attempt: None,
            message: None,
        }
    }

    /// Attaches an attempt counter.
    #[must_use]
    pub const fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Attaches a detail message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sink for harness events.
pub trait HarnessEventSink: Send + Sync {
    /// Record a harness event.
    fn record(&self, event: &HarnessEvent);
}

/// Sink that logs JSON lines to stderr.
pub struct StderrEventSink;

impl HarnessEventSink for StderrEventSink {
    fn record(&self, event: &HarnessEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Sink that logs JSON lines to a file.
pub struct FileEventSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileEventSink {
    /// Opens the event log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl HarnessEventSink for FileEventSink {
    fn record(&self, event: &HarnessEvent) {
        let Ok(payload) = serde_json::to_string(event) else {
            return;
        };
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{payload}");
        }
    }
}

/// No-op sink.
pub struct NoopEventSink;

impl HarnessEventSink for NoopEventSink {
    fn record(&self, _event: &HarnessEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================

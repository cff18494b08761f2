// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for the deployment system-tests.
// Purpose: Provide artifact reporting and an in-process echo deployer.
// Dependencies: system-tests, endpoints-deploy, endpoints-echo
// ============================================================================

//! ## Overview
//! Shared helpers for the deployment system-tests.
//! Invariants:
//! - Every test writes a `summary.json` and `summary.md`, even on panic.
//! - Harness events are captured as JSON lines next to the summary.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod artifacts;

// crates/endpoints-deploy/src/config/mod.rs
// ============================================================================
// Module: Deployment Configuration
// Description: Environment-backed settings for the deployment harness.
// Purpose: Provide typed access to gate variables and deployment knobs.
// Dependencies: std, thiserror
// ============================================================================

//! ## Overview
//! Deployment settings are read from environment variables and mapped into a
//! small typed structure. Absent values stay `None` so the harness can decide
//! whether to skip; malformed values fail closed with [`ConfigError`] once
//! the gates pass.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod env;

// ============================================================================
// SECTION: Tests
// ============================================================================


// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use env::ConfigError;
pub use env::DeploymentEnv;
pub use env::DeploymentSettings;
pub use env::read_env_strict;

// system-tests/src/lib.rs
// ============================================================================
// Module: Endpoints System Tests Library
// Description: Shared configuration for the deployment system tests.
// Purpose: Provide typed settings for the system-test binaries.
// Dependencies: std
// ============================================================================

//! ## Overview
//! This crate hosts shared configuration used by the system-test binaries in
//! `system-tests/tests`. Deployment gating itself lives in `endpoints-deploy`;
//! this layer only controls where artifacts land and which application tree
//! is deployed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

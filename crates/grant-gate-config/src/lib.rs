// grant-gate-config/src/lib.rs
// ============================================================================
// Module: Grant Gate Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for grant-gate.toml semantics.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! `grant-gate-config` defines the configuration model for Grant Gate. It
//! provides strict, fail-closed loading and validation plus a canonical
//! example file.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;

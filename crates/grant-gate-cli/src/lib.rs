// grant-gate-cli/src/lib.rs
// ============================================================================
// Module: Grant Gate CLI Library
// Description: Shared helpers for the Grant Gate command-line interface.
// Purpose: Keep command logic testable apart from argument parsing.
// Dependencies: grant-gate-admission, grant-gate-config, thiserror
// ============================================================================

//! ## Overview
//! The binary entry point (`src/main.rs`) parses arguments and writes output;
//! everything it does with the inputs lives here.
//!
//! Security posture: snapshot, request, and configuration files are
//! untrusted. Reads are size-limited and decoding fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod evaluate;
pub mod input;
pub mod snapshot;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt::Display;
use std::path::Path;

use grant_gate_admission::AdmissionError;
use grant_gate_config::CONFIG_ENV_VAR;
use grant_gate_config::ConfigError;
use grant_gate_config::GrantGateConfig;
use thiserror::Error;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use evaluate::AdmissionInput;
pub use evaluate::Evaluation;
pub use evaluate::evaluate;
pub use input::MAX_INPUT_BYTES;
pub use input::read_bytes_with_limit;
pub use input::read_json;
pub use snapshot::ClusterSnapshot;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failures.
#[derive(Debug, Error)]
pub enum CliError {
    /// An input file could not be read or decoded.
    #[error("failed to read {label} from {path}: {message}")]
    Input {
        /// Input role, such as `snapshot`.
        label: String,
        /// Path as given.
        path: String,
        /// Underlying failure.
        message: String,
    },
    /// The request document matched no admission shape.
    #[error("failed to decode request: {0}")]
    Decode(String),
    /// Configuration failed to load.
    #[error("failed to load config: {0}")]
    Config(#[from] ConfigError),
    /// The admission handler could not be assembled.
    #[error("failed to assemble policy engine: {0}")]
    Admission(#[from] AdmissionError),
    /// The audit sink could not be opened.
    #[error("failed to open audit sink: {0}")]
    Audit(String),
    /// Output could not be rendered or written.
    #[error("failed to write output: {0}")]
    Output(String),
}

impl CliError {
    /// Builds an input error for `path`.
    pub fn input(label: &str, path: &Path, error: impl Display) -> Self {
        Self::Input {
            label: label.to_string(),
            path: path.display().to_string(),
            message: error.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Resolves configuration for a command.
///
/// An explicit path or the `GRANT_GATE_CONFIG` variable is loaded and must be
/// valid. With neither, the defaults apply.
///
/// # Errors
///
/// Returns [`CliError::Config`] when a named configuration fails to load.
pub fn resolve_config(path: Option<&Path>) -> Result<GrantGateConfig, CliError> {
    if path.is_none() && env::var_os(CONFIG_ENV_VAR).is_none() {
        return Ok(GrantGateConfig::default());
    }
    Ok(GrantGateConfig::load(path)?)
}

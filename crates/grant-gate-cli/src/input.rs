// grant-gate-cli/src/input.rs
// ============================================================================
// Module: CLI Input Limits
// Description: Size-limited file reads and JSON decoding for CLI inputs.
// Purpose: Keep untrusted input files bounded before they are parsed.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every file the CLI reads passes through [`read_bytes_with_limit`], which
//! checks the reported size up front and then caps the actual read, so a file
//! that grows while being read is still rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::CliError;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a snapshot or request input.
pub const MAX_INPUT_BYTES: usize = 4 * 1024 * 1024;

// ============================================================================
// SECTION: Reading
// ============================================================================

/// Failures while reading a bounded input file.
#[derive(Debug, Error)]
pub enum ReadLimitError {
    /// File I/O failure.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// File size exceeds the configured limit.
    #[error("file exceeds size limit ({size} > {limit} bytes)")]
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
///
/// # Errors
///
/// Returns [`ReadLimitError`] when the file cannot be read or is too large.
pub fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reads and decodes a bounded JSON input file.
///
/// # Errors
///
/// Returns [`CliError::Input`] naming `label` when reading or decoding fails.
pub fn read_json<T: DeserializeOwned>(path: &Path, label: &str) -> Result<T, CliError> {
    let bytes = read_bytes_with_limit(path, MAX_INPUT_BYTES)
        .map_err(|err| CliError::input(label, path, err))?;
    serde_json::from_slice(&bytes).map_err(|err| CliError::input(label, path, err))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use std::io::Write;

    use super::*;

    #[test]
    fn oversized_file_is_rejected_before_reading() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[b'x'; 32]).unwrap();
        let err = read_bytes_with_limit(file.path(), 16).unwrap_err();
        assert!(matches!(
            err,
            ReadLimitError::TooLarge {
                size: 32,
                limit: 16
            }
        ));
    }

    #[test]
    fn file_at_the_limit_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[b'x'; 16]).unwrap();
        assert_eq!(read_bytes_with_limit(file.path(), 16).unwrap().len(), 16);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_bytes_with_limit(&dir.path().join("absent.json"), 16).unwrap_err();
        assert!(matches!(err, ReadLimitError::Io(_)));
    }
}

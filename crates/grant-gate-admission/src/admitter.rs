// grant-gate-admission/src/admitter.rs
// ============================================================================
// Module: Admitters
// Description: Validating and mutating admitter contracts.
// Purpose: Define the seam between dispatch and per-resource policy.
// Dependencies: async-trait, grant-gate-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A validating admitter returns an allow or deny decision. A mutating
//! admitter may additionally return a rewritten object, which dispatch turns
//! into a JSON patch. Errors are distinct from denials: an error means the
//! decision could not be reached and is answered with a 500 status.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use grant_gate_core::CacheError;
use grant_gate_core::CircularRefError;
use grant_gate_core::ResolveError;
use serde_json::Value;
use thiserror::Error;

use crate::request::AdmissionRequest;
use crate::request::GroupVersionResource;
use crate::request::Status;

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// Outcome of a validating admitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// The request may proceed.
    Allowed,
    /// The request is rejected with the given status.
    Denied(Status),
}

impl AdmissionDecision {
    /// Denial with `400 BadRequest`.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Denied(Status::bad_request(message))
    }

    /// Denial with `401 Unauthorized`.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Denied(Status::unauthorized(message))
    }

    /// Returns true when the request may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Outcome of a mutating admitter.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// The request may proceed unchanged.
    Unchanged,
    /// The request may proceed with the rewritten object.
    Patched(Value),
    /// The request is rejected with the given status.
    Denied(Status),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures that prevent an admission decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// The request or its objects could not be decoded.
    #[error("unable to decode admission request: {0}")]
    Decode(String),
    /// Rule resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// A cache read failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// No admitter is registered for the resource.
    #[error("no admitter registered for {0}")]
    NoRoute(GroupVersionResource),
    /// A mutation result could not be turned into a patch.
    #[error("unable to build patch: {0}")]
    Patch(String),
    /// Registration conflict or other internal failure.
    #[error("{0}")]
    Internal(String),
}

impl AdmissionError {
    /// Status reported for this failure.
    #[must_use]
    pub fn status(&self) -> Status {
        Status::internal(self.to_string())
    }
}

impl From<CircularRefError> for AdmissionError {
    fn from(err: CircularRefError) -> Self {
        match err {
            CircularRefError::TemplateNotFound(name) => {
                Self::Resolve(ResolveError::TemplateNotFound(name))
            }
            CircularRefError::Cache(err) => Self::Cache(err),
        }
    }
}

// ============================================================================
// SECTION: Traits
// ============================================================================

/// Admitter that accepts or rejects requests.
#[async_trait]
pub trait ValidatingAdmitter: Send + Sync {
    /// Stable admitter name used in audit events.
    fn name(&self) -> &'static str;

    /// Returns the decision for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] when no decision can be reached.
    async fn admit(&self, request: &AdmissionRequest) -> Result<AdmissionDecision, AdmissionError>;
}

/// Admitter that may rewrite the submitted object.
#[async_trait]
pub trait MutatingAdmitter: Send + Sync {
    /// Stable admitter name used in audit events.
    fn name(&self) -> &'static str;

    /// Returns the mutation outcome for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] when no decision can be reached.
    async fn admit(&self, request: &AdmissionRequest) -> Result<MutationOutcome, AdmissionError>;
}

/// Admitter registered for one resource type.
#[derive(Clone)]
pub enum Admitter {
    /// Validating admitter; several may share a resource.
    Validating(Arc<dyn ValidatingAdmitter>),
    /// Mutating admitter; at most one per resource.
    Mutating(Arc<dyn MutatingAdmitter>),
}

impl Admitter {
    /// Returns the admitter name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Validating(admitter) => admitter.name(),
            Self::Mutating(admitter) => admitter.name(),
        }
    }
}

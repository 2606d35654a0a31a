// grant-gate-cli/src/evaluate.rs
// ============================================================================
// Module: Offline Evaluation
// Description: Runs one admission request against a snapshot.
// Purpose: Answer "would this be admitted?" without a live platform.
// Dependencies: grant-gate-admission, grant-gate-config, serde_json
// ============================================================================

//! ## Overview
//! The request input is either a full admission review or a bare request.
//! The answer mirrors the input shape so it can be replayed against a real
//! webhook response.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use grant_gate_admission::AdmissionAuditSink;
use grant_gate_admission::AdmissionMode;
use grant_gate_admission::AdmissionRequest;
use grant_gate_admission::AdmissionResponse;
use grant_gate_admission::AdmissionReview;
use grant_gate_admission::build_handler;
use grant_gate_admission::request::ADMISSION_REVIEW_KIND;
use grant_gate_config::GrantGateConfig;
use serde_json::Value;

use crate::CliError;
use crate::snapshot::ClusterSnapshot;

// ============================================================================
// SECTION: Input
// ============================================================================

/// Decoded request input.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionInput {
    /// Full review envelope.
    Review(AdmissionReview),
    /// Bare request.
    Request(AdmissionRequest),
}

impl AdmissionInput {
    /// Decodes a review or a bare request.
    ///
    /// A document is a review when its `kind` is `AdmissionReview` or it
    /// carries a `request` field.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Decode`] when the document matches neither shape.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CliError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|err| CliError::Decode(err.to_string()))?;
        let is_review = value.get("kind").and_then(Value::as_str) == Some(ADMISSION_REVIEW_KIND)
            || value.get("request").is_some();
        if is_review {
            serde_json::from_value(value)
                .map(Self::Review)
                .map_err(|err| CliError::Decode(format!("admission review: {err}")))
        } else {
            serde_json::from_value(value)
                .map(Self::Request)
                .map_err(|err| CliError::Decode(format!("admission request: {err}")))
        }
    }
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Evaluation answer in the shape of its input.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Review envelope carrying the response.
    Review(AdmissionReview),
    /// Bare response.
    Response(AdmissionResponse),
}

impl Evaluation {
    /// Returns the response regardless of envelope.
    #[must_use]
    pub const fn response(&self) -> Option<&AdmissionResponse> {
        match self {
            Self::Review(review) => review.response.as_ref(),
            Self::Response(response) => Some(response),
        }
    }

    /// Returns true when the request was admitted.
    #[must_use]
    pub fn allowed(&self) -> bool {
        self.response().is_some_and(|response| response.allowed)
    }

    /// Renders the answer as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Output`] when serialization fails.
    pub fn to_json(&self) -> Result<String, CliError> {
        let rendered = match self {
            Self::Review(review) => serde_json::to_string_pretty(review),
            Self::Response(response) => serde_json::to_string_pretty(response),
        };
        rendered.map_err(|err| CliError::Output(err.to_string()))
    }
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates one input against a snapshot.
///
/// # Errors
///
/// Returns [`CliError::Admission`] when the handler cannot be assembled.
/// Policy denials and failed decisions are answers, not errors.
pub async fn evaluate(
    snapshot: ClusterSnapshot,
    input: AdmissionInput,
    config: &GrantGateConfig,
    mode: AdmissionMode,
    audit: Arc<dyn AdmissionAuditSink>,
) -> Result<Evaluation, CliError> {
    let handler = build_handler(&snapshot.into_caches(), config, None, audit)?;
    let evaluation = match input {
        AdmissionInput::Review(review) => {
            Evaluation::Review(handler.handle_review(mode, review).await)
        }
        AdmissionInput::Request(request) => {
            Evaluation::Response(handler.handle(mode, &request).await)
        }
    };
    Ok(evaluation)
}

// grant-gate-admission/src/dispatch.rs
// ============================================================================
// Module: Admission Dispatch
// Description: Routes admission requests to registered admitters.
// Purpose: Turn admitter output into admission responses and audit events.
// Dependencies: grant-gate-config, serde_json
// ============================================================================

//! ## Overview
//! Each request is checked for the break-glass identity, routed by resource,
//! and run through the admitters registered for that resource. Validators run
//! in registration order: the first error aborts with a 500 status and the
//! first denial returns immediately. A resource has at most one mutator, whose
//! rewritten object is returned as a JSON patch.
//!
//! Every request yields exactly one `admission_decision` audit event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use grant_gate_config::BreakGlassConfig;
use serde::Deserialize;
use serde::Serialize;

use crate::admitter::AdmissionDecision;
use crate::admitter::AdmissionError;
use crate::admitter::Admitter;
use crate::admitter::MutatingAdmitter;
use crate::admitter::MutationOutcome;
use crate::admitter::ValidatingAdmitter;
use crate::audit::AdmissionAuditSink;
use crate::audit::BREAK_GLASS_KIND;
use crate::audit::DecisionAuditEvent;
use crate::audit::DecisionAuditEventParams;
use crate::audit::SecurityAuditEvent;
use crate::audit::SecurityAuditEventParams;
use crate::patch::diff;
use crate::patch::encode_patch;
use crate::request::AdmissionRequest;
use crate::request::AdmissionResponse;
use crate::request::AdmissionReview;
use crate::request::GroupVersionResource;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Webhook flavor a request arrived on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    /// Validating webhook.
    #[default]
    Validate,
    /// Mutating webhook.
    Mutate,
}

impl AdmissionMode {
    /// Returns the mode label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Mutate => "mutate",
        }
    }
}

/// Response plus the admitter that produced it.
struct Verdict {
    /// Admission response.
    response: AdmissionResponse,
    /// Deciding admitter, if any ran.
    admitter: Option<&'static str>,
}

impl Verdict {
    /// Verdict produced without an admitter.
    const fn plain(response: AdmissionResponse) -> Self {
        Self {
            response,
            admitter: None,
        }
    }
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Admission dispatcher holding the admitter registry.
pub struct AdmissionHandler {
    /// Validators per resource, in registration order.
    validators: BTreeMap<GroupVersionResource, Vec<Arc<dyn ValidatingAdmitter>>>,
    /// Single mutator per resource.
    mutators: BTreeMap<GroupVersionResource, Arc<dyn MutatingAdmitter>>,
    /// Break-glass identity.
    break_glass: BreakGlassConfig,
    /// Audit sink.
    audit: Arc<dyn AdmissionAuditSink>,
}

impl AdmissionHandler {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new(break_glass: BreakGlassConfig, audit: Arc<dyn AdmissionAuditSink>) -> Self {
        Self {
            validators: BTreeMap::new(),
            mutators: BTreeMap::new(),
            break_glass,
            audit,
        }
    }

    /// Registers an admitter for `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Internal`] when a second mutator is
    /// registered for the same resource.
    pub fn register(
        &mut self,
        resource: GroupVersionResource,
        admitter: Admitter,
    ) -> Result<(), AdmissionError> {
        match admitter {
            Admitter::Validating(validator) => {
                self.validators.entry(resource).or_default().push(validator);
            }
            Admitter::Mutating(mutator) => {
                if let Some(existing) = self.mutators.get(&resource) {
                    return Err(AdmissionError::Internal(format!(
                        "mutator {} already registered for {resource}",
                        existing.name()
                    )));
                }
                self.mutators.insert(resource, mutator);
            }
        }
        Ok(())
    }

    /// Returns the resources with admitters for `mode`.
    #[must_use]
    pub fn routes(&self, mode: AdmissionMode) -> Vec<GroupVersionResource> {
        match mode {
            AdmissionMode::Validate => self.validators.keys().cloned().collect(),
            AdmissionMode::Mutate => self.mutators.keys().cloned().collect(),
        }
    }

    /// Handles a decoded request.
    pub async fn handle(&self, mode: AdmissionMode, request: &AdmissionRequest) -> AdmissionResponse {
        let verdict = if self.is_break_glass(request) {
            self.record_break_glass(request);
            Verdict::plain(AdmissionResponse::allowed(&request.uid))
        } else {
            match mode {
                AdmissionMode::Validate => self.run_validators(request).await,
                AdmissionMode::Mutate => self.run_mutator(request).await,
            }
        };
        self.record_decision(mode, request, &verdict);
        verdict.response
    }

    /// Handles a request through the validating chain.
    pub async fn validate(&self, request: &AdmissionRequest) -> AdmissionResponse {
        self.handle(AdmissionMode::Validate, request).await
    }

    /// Handles a request through the resource's mutator.
    pub async fn mutate(&self, request: &AdmissionRequest) -> AdmissionResponse {
        self.handle(AdmissionMode::Mutate, request).await
    }

    /// Handles a review envelope, answering with a response envelope.
    pub async fn handle_review(&self, mode: AdmissionMode, review: AdmissionReview) -> AdmissionReview {
        let response = match review.request {
            Some(request) => self.handle(mode, &request).await,
            None => {
                let err = AdmissionError::Decode("review has no request".to_string());
                AdmissionResponse::errored("", &err)
            }
        };
        AdmissionReview::from_response(response)
    }

    /// Decodes and handles raw review bytes.
    ///
    /// Undecodable input yields a 500-class response with an empty uid.
    pub async fn handle_review_bytes(&self, mode: AdmissionMode, bytes: &[u8]) -> AdmissionReview {
        match serde_json::from_slice::<AdmissionReview>(bytes) {
            Ok(review) => self.handle_review(mode, review).await,
            Err(err) => {
                let err = AdmissionError::Decode(err.to_string());
                AdmissionReview::from_response(AdmissionResponse::errored("", &err))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Chains
    // ------------------------------------------------------------------------

    /// Runs the validating chain for the request's resource.
    async fn run_validators(&self, request: &AdmissionRequest) -> Verdict {
        let Some(chain) = self.validators.get(&request.resource) else {
            let err = AdmissionError::NoRoute(request.resource.clone());
            return Verdict::plain(AdmissionResponse::errored(&request.uid, &err));
        };
        for validator in chain {
            let response = match validator.admit(request).await {
                Ok(AdmissionDecision::Allowed) => continue,
                Ok(AdmissionDecision::Denied(status)) => {
                    AdmissionResponse::denied(&request.uid, status)
                }
                Err(err) => AdmissionResponse::errored(&request.uid, &err),
            };
            return Verdict {
                response,
                admitter: Some(validator.name()),
            };
        }
        Verdict {
            response: AdmissionResponse::allowed(&request.uid),
            admitter: chain.last().map(|validator| validator.name()),
        }
    }

    /// Runs the mutator for the request's resource.
    async fn run_mutator(&self, request: &AdmissionRequest) -> Verdict {
        let Some(mutator) = self.mutators.get(&request.resource) else {
            let err = AdmissionError::NoRoute(request.resource.clone());
            return Verdict::plain(AdmissionResponse::errored(&request.uid, &err));
        };
        let response = match mutator.admit(request).await {
            Ok(MutationOutcome::Unchanged) => AdmissionResponse::allowed(&request.uid),
            Ok(MutationOutcome::Denied(status)) => AdmissionResponse::denied(&request.uid, status),
            Ok(MutationOutcome::Patched(updated)) => {
                match patch_response(request, &updated) {
                    Ok(response) => response,
                    Err(err) => AdmissionResponse::errored(&request.uid, &err),
                }
            }
            Err(err) => AdmissionResponse::errored(&request.uid, &err),
        };
        Verdict {
            response,
            admitter: Some(mutator.name()),
        }
    }

    // ------------------------------------------------------------------------
    // Break Glass
    // ------------------------------------------------------------------------

    /// Returns true when the requester is the break-glass identity.
    fn is_break_glass(&self, request: &AdmissionRequest) -> bool {
        let user = &request.user_info;
        user.username == self.break_glass.username
            && user.groups.iter().any(|group| *group == self.break_glass.group)
    }

    // ------------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------------

    /// Records the break-glass admission.
    fn record_break_glass(&self, request: &AdmissionRequest) {
        self.audit.record_security(&SecurityAuditEvent::new(SecurityAuditEventParams {
            kind: BREAK_GLASS_KIND,
            username: request.user_info.username.clone(),
            resource: request.resource.to_string(),
            scope: request.namespace.clone().unwrap_or_default(),
            message: format!("{} {} admitted by break-glass identity", request.operation, request.name),
        }));
    }

    /// Records the decision for a request.
    fn record_decision(&self, mode: AdmissionMode, request: &AdmissionRequest, verdict: &Verdict) {
        let response = &verdict.response;
        self.audit.record_decision(&DecisionAuditEvent::new(DecisionAuditEventParams {
            uid: request.uid.clone(),
            mode: mode.as_str(),
            resource: request.resource.to_string(),
            operation: request.operation.to_string(),
            name: request.name.clone(),
            username: request.user_info.username.clone(),
            allowed: response.allowed,
            code: response.code(),
            message: response.status.as_ref().map(|status| status.message.clone()),
            admitter: verdict.admitter,
        }));
    }
}

/// Builds an allowed response carrying the patch from the submitted object.
fn patch_response(
    request: &AdmissionRequest,
    updated: &serde_json::Value,
) -> Result<AdmissionResponse, AdmissionError> {
    let original = request
        .object
        .as_ref()
        .ok_or_else(|| AdmissionError::Patch("request has no object to patch".to_string()))?;
    let ops = diff(original, updated);
    let response = AdmissionResponse::allowed(&request.uid);
    if ops.is_empty() {
        return Ok(response);
    }
    Ok(response.with_patch(encode_patch(&ops)?))
}

// grant-gate-admission/tests/dispatch.rs
// ============================================================================
// Module: Admission Dispatch Tests
// Description: Routing, chain semantics, patching, and break-glass bypass.
// ============================================================================
//! ## Overview
//! Exercises the dispatcher with scripted admitters so chain ordering and
//! failure handling are observable independent of resource policy.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use grant_gate_admission::AdmissionDecision;
use grant_gate_admission::AdmissionError;
use grant_gate_admission::AdmissionHandler;
use grant_gate_admission::AdmissionMode;
use grant_gate_admission::AdmissionRequest;
use grant_gate_admission::AdmissionReview;
use grant_gate_admission::Admitter;
use grant_gate_admission::GroupVersionResource;
use grant_gate_admission::MemoryAuditSink;
use grant_gate_admission::MutatingAdmitter;
use grant_gate_admission::MutationOutcome;
use grant_gate_admission::Operation;
use grant_gate_admission::PatchOp;
use grant_gate_admission::PatchOperation;
use grant_gate_admission::ValidatingAdmitter;
use grant_gate_config::BreakGlassConfig;
use grant_gate_core::UserInfo;
use serde_json::json;

// ============================================================================
// SECTION: Scripted Admitters
// ============================================================================

/// Shared call log.
type Calls = Arc<Mutex<Vec<&'static str>>>;

/// Validator returning a fixed result and logging its invocation.
struct Scripted {
    name: &'static str,
    result: Result<AdmissionDecision, AdmissionError>,
    calls: Calls,
}

#[async_trait]
impl ValidatingAdmitter for Scripted {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn admit(&self, _request: &AdmissionRequest) -> Result<AdmissionDecision, AdmissionError> {
        self.calls.lock().unwrap().push(self.name);
        self.result.clone()
    }
}

/// Mutator that sets `spec.touched`.
struct Toucher;

#[async_trait]
impl MutatingAdmitter for Toucher {
    fn name(&self) -> &'static str {
        "toucher"
    }

    async fn admit(&self, request: &AdmissionRequest) -> Result<MutationOutcome, AdmissionError> {
        let mut object = request.object.clone().unwrap();
        if object.pointer("/spec/touched").is_some() {
            return Ok(MutationOutcome::Unchanged);
        }
        object["spec"]["touched"] = json!(true);
        Ok(MutationOutcome::Patched(object))
    }
}

fn widgets() -> GroupVersionResource {
    GroupVersionResource::new("example.io", "v1", "widgets")
}

fn validator(
    name: &'static str,
    result: Result<AdmissionDecision, AdmissionError>,
    calls: &Calls,
) -> Admitter {
    Admitter::Validating(Arc::new(Scripted {
        name,
        result,
        calls: Arc::clone(calls),
    }))
}

fn handler() -> (AdmissionHandler, Arc<MemoryAuditSink>) {
    let audit = Arc::new(MemoryAuditSink::new());
    (AdmissionHandler::new(BreakGlassConfig::default(), audit.clone()), audit)
}

fn widget_request(username: &str, groups: &[&str]) -> AdmissionRequest {
    AdmissionRequest::new(
        "uid-1",
        widgets(),
        Operation::Create,
        UserInfo::new(username, groups.iter().copied()),
    )
    .with_object(json!({"metadata": {"name": "w"}, "spec": {}}))
}

// ============================================================================
// SECTION: Validating Chain
// ============================================================================

#[tokio::test]
async fn validators_run_in_order_until_first_denial() {
    let calls = Calls::default();
    let (mut handler, audit) = handler();
    handler.register(widgets(), validator("first", Ok(AdmissionDecision::Allowed), &calls)).unwrap();
    handler
        .register(widgets(), validator("second", Ok(AdmissionDecision::bad_request("no")), &calls))
        .unwrap();
    handler.register(widgets(), validator("third", Ok(AdmissionDecision::Allowed), &calls)).unwrap();

    let response = handler.validate(&widget_request("alice", &[])).await;
    assert!(!response.allowed);
    assert_eq!(response.uid, "uid-1");
    assert_eq!(response.code(), 400);
    assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);

    let decisions = audit.events_labeled("admission_decision");
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0]["admitter"], "second");
    assert_eq!(decisions[0]["code"], 400);
}

#[tokio::test]
async fn first_error_fails_closed() {
    let calls = Calls::default();
    let (mut handler, _audit) = handler();
    let failure = Err(AdmissionError::Internal("cache offline".to_string()));
    handler.register(widgets(), validator("broken", failure, &calls)).unwrap();
    handler.register(widgets(), validator("never", Ok(AdmissionDecision::Allowed), &calls)).unwrap();

    let response = handler.validate(&widget_request("alice", &[])).await;
    assert!(!response.allowed);
    let status = response.status.unwrap();
    assert_eq!(status.code, 500);
    assert_eq!(status.reason, "InternalError");
    assert!(status.message.contains("cache offline"));
    assert_eq!(*calls.lock().unwrap(), vec!["broken"]);
}

#[tokio::test]
async fn all_allowing_validators_allow() {
    let calls = Calls::default();
    let (mut handler, _audit) = handler();
    handler.register(widgets(), validator("a", Ok(AdmissionDecision::Allowed), &calls)).unwrap();
    handler.register(widgets(), validator("b", Ok(AdmissionDecision::Allowed), &calls)).unwrap();

    let response = handler.validate(&widget_request("alice", &[])).await;
    assert!(response.allowed);
    assert!(response.status.is_none());
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn unrouted_resource_fails_closed() {
    let (handler, _audit) = handler();
    let response = handler.validate(&widget_request("alice", &[])).await;
    assert!(!response.allowed);
    assert_eq!(response.code(), 500);
    assert!(response.status.unwrap().message.contains("widgets"));
}

// ============================================================================
// SECTION: Break Glass
// ============================================================================

#[tokio::test]
async fn break_glass_identity_skips_admitters() {
    let calls = Calls::default();
    let (mut handler, audit) = handler();
    handler
        .register(widgets(), validator("deny", Ok(AdmissionDecision::unauthorized("no")), &calls))
        .unwrap();
    let sudo = BreakGlassConfig::default();

    let response = handler.validate(&widget_request(&sudo.username, &[sudo.group.as_str()])).await;
    assert!(response.allowed);
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(audit.events_labeled("break_glass").len(), 1);

    let response = handler.validate(&widget_request(&sudo.username, &[])).await;
    assert!(!response.allowed);
    assert_eq!(response.code(), 401);
    assert_eq!(audit.events_labeled("break_glass").len(), 1);
    assert_eq!(audit.events_labeled("admission_decision").len(), 2);
}

// ============================================================================
// SECTION: Mutation
// ============================================================================

#[tokio::test]
async fn mutator_output_becomes_json_patch() {
    let (mut handler, _audit) = handler();
    handler.register(widgets(), Admitter::Mutating(Arc::new(Toucher))).unwrap();

    let response = handler.mutate(&widget_request("alice", &[])).await;
    assert!(response.allowed);
    assert_eq!(response.patch_type.as_deref(), Some("JSONPatch"));
    let bytes = STANDARD.decode(response.patch.unwrap()).unwrap();
    let ops: Vec<PatchOperation> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        ops,
        vec![PatchOperation {
            op: PatchOp::Add,
            path: "/spec/touched".to_string(),
            value: Some(json!(true)),
        }]
    );

    let touched = widget_request("alice", &[])
        .with_object(json!({"metadata": {"name": "w"}, "spec": {"touched": true}}));
    let response = handler.mutate(&touched).await;
    assert!(response.allowed);
    assert!(response.patch.is_none());
    assert!(response.patch_type.is_none());
}

#[tokio::test]
async fn second_mutator_for_a_resource_is_rejected() {
    let (mut handler, _audit) = handler();
    handler.register(widgets(), Admitter::Mutating(Arc::new(Toucher))).unwrap();
    let err = handler.register(widgets(), Admitter::Mutating(Arc::new(Toucher))).unwrap_err();
    assert!(matches!(err, AdmissionError::Internal(_)));
    assert_eq!(handler.routes(AdmissionMode::Mutate), vec![widgets()]);
    assert!(handler.routes(AdmissionMode::Validate).is_empty());
}

// ============================================================================
// SECTION: Review Envelope
// ============================================================================

#[tokio::test]
async fn review_bytes_are_decoded_and_answered() {
    let calls = Calls::default();
    let (mut handler, _audit) = handler();
    handler.register(widgets(), validator("ok", Ok(AdmissionDecision::Allowed), &calls)).unwrap();

    let review = AdmissionReview::from_request(widget_request("alice", &[]));
    let bytes = serde_json::to_vec(&review).unwrap();
    let answer = handler.handle_review_bytes(AdmissionMode::Validate, &bytes).await;
    assert_eq!(answer.api_version, "admission.k8s.io/v1");
    assert_eq!(answer.kind, "AdmissionReview");
    let response = answer.response.unwrap();
    assert!(response.allowed);
    assert_eq!(response.uid, "uid-1");
}

#[tokio::test]
async fn undecodable_review_fails_closed() {
    let (handler, audit) = handler();
    let answer = handler.handle_review_bytes(AdmissionMode::Validate, b"{not json").await;
    let response = answer.response.unwrap();
    assert!(!response.allowed);
    assert_eq!(response.uid, "");
    assert_eq!(response.code(), 500);
    assert!(audit.events().is_empty());

    let answer = handler
        .handle_review_bytes(AdmissionMode::Validate, br#"{"apiVersion":"admission.k8s.io/v1","kind":"AdmissionReview"}"#)
        .await;
    assert_eq!(answer.response.unwrap().code(), 500);
}

// grant-gate-admission/src/lib.rs
// ============================================================================
// Module: Grant Gate Admission Library
// Description: Admission contract, dispatch, and resource admitters.
// Purpose: Turn admission requests into escalation-safe decisions.
// Dependencies: grant-gate-core, grant-gate-config, serde_json
// ============================================================================

//! ## Overview
//! `grant-gate-admission` decodes admission reviews, routes them to the
//! validators and mutators registered per resource, and encodes the verdict.
//! Denials caused by the submitted object are explicit responses; failures
//! to reach a decision fail closed with a 500 status.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod admitter;
pub mod audit;
pub mod dispatch;
pub mod engine;
pub mod patch;
pub mod request;
pub mod resources;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use admitter::AdmissionDecision;
pub use admitter::AdmissionError;
pub use admitter::Admitter;
pub use admitter::MutatingAdmitter;
pub use admitter::MutationOutcome;
pub use admitter::ValidatingAdmitter;
pub use audit::AdmissionAuditSink;
pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::audit_sink_from_config;
pub use dispatch::AdmissionHandler;
pub use dispatch::AdmissionMode;
pub use engine::ClusterCaches;
pub use engine::build_handler;
pub use patch::PatchOp;
pub use patch::PatchOperation;
pub use patch::diff;
pub use patch::encode_patch;
pub use request::AdmissionRequest;
pub use request::AdmissionResponse;
pub use request::AdmissionReview;
pub use request::GroupVersionResource;
pub use request::Operation;
pub use request::Status;
pub use resources::EscalationGuard;
pub use resources::creator::CREATOR_ID_ANNOTATION;
pub use resources::management_resource;

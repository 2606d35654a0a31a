// grant-gate-admission/src/resources/mod.rs
// ============================================================================
// Module: Resource Admitters
// Description: Validators and mutators for platform RBAC resources.
// Purpose: Apply escalation and inheritance checks per resource type.
// Dependencies: grant-gate-core
// ============================================================================

//! ## Overview
//! Each resource admitter decodes the submitted object, applies structural
//! checks that stem from the submitted object (denied with 400), and then runs
//! the escalation check (denied with 401). Lookup and cache failures are
//! returned as errors so dispatch fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod bindings;
pub mod creator;
pub mod global_role;
pub mod global_role_binding;
pub mod role_template;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use grant_gate_core::EscalateCheck;
use grant_gate_core::EscalateTarget;
use grant_gate_core::EscalationError;
use grant_gate_core::MANAGEMENT_API_GROUP;
use grant_gate_core::PermissionChecker;
use grant_gate_core::PolicyRule;
use grant_gate_core::ResolveError;
use grant_gate_core::UserInfo;
use grant_gate_core::escalation_authorized;

use crate::admitter::AdmissionDecision;
use crate::admitter::AdmissionError;
use crate::audit::AdmissionAuditSink;
use crate::audit::ESCALATE_BYPASS_KIND;
use crate::audit::PERMISSION_CHECK_FAILED_KIND;
use crate::audit::SecurityAuditEvent;
use crate::audit::SecurityAuditEventParams;
use crate::request::GroupVersionResource;

// ============================================================================
// SECTION: Resources
// ============================================================================

/// API version of the platform management resources.
pub const MANAGEMENT_API_VERSION: &str = "v3";
/// Role template resource name.
pub const ROLE_TEMPLATES: &str = "roletemplates";
/// Cluster role template binding resource name.
pub const CLUSTER_ROLE_TEMPLATE_BINDINGS: &str = "clusterroletemplatebindings";
/// Project role template binding resource name.
pub const PROJECT_ROLE_TEMPLATE_BINDINGS: &str = "projectroletemplatebindings";
/// Global role resource name.
pub const GLOBAL_ROLES: &str = "globalroles";
/// Global role binding resource name.
pub const GLOBAL_ROLE_BINDINGS: &str = "globalrolebindings";

/// Returns the management resource identifier for `resource`.
#[must_use]
pub fn management_resource(resource: &str) -> GroupVersionResource {
    GroupVersionResource::new(MANAGEMENT_API_GROUP, MANAGEMENT_API_VERSION, resource)
}

// ============================================================================
// SECTION: Escalate Bypass
// ============================================================================

/// Runs the audited escalate-verb bypass.
#[derive(Clone)]
pub struct EscalationGuard {
    /// Live permission checker.
    checker: Arc<dyn PermissionChecker>,
    /// Time limit for one check.
    timeout: Duration,
    /// Audit sink for bypasses and failed checks.
    audit: Arc<dyn AdmissionAuditSink>,
}

impl EscalationGuard {
    /// Creates a guard.
    #[must_use]
    pub fn new(
        checker: Arc<dyn PermissionChecker>,
        timeout: Duration,
        audit: Arc<dyn AdmissionAuditSink>,
    ) -> Self {
        Self {
            checker,
            timeout,
            audit,
        }
    }

    /// Returns true when `user` holds `escalate` on the management `resource`
    /// at `scope`. Failed checks are audited and never authorize.
    pub async fn bypass(&self, user: &UserInfo, resource: &str, scope: &str) -> bool {
        let target = EscalateTarget {
            api_group: MANAGEMENT_API_GROUP,
            resource,
            scope,
        };
        let outcome = escalation_authorized(self.checker.as_ref(), user, target, self.timeout).await;
        let (kind, message) = match outcome {
            EscalateCheck::Authorized => {
                (ESCALATE_BYPASS_KIND, "escalate verb held; coverage check skipped".to_string())
            }
            EscalateCheck::NotAuthorized => return false,
            EscalateCheck::CheckFailed(reason) => (PERMISSION_CHECK_FAILED_KIND, reason),
        };
        self.audit.record_security(&SecurityAuditEvent::new(SecurityAuditEventParams {
            kind,
            username: user.username.clone(),
            resource: format!("{resource}.{MANAGEMENT_API_GROUP}"),
            scope: scope.to_string(),
            message,
        }));
        kind == ESCALATE_BYPASS_KIND
    }
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Maps an escalation check result to an admission decision.
///
/// Uncovered rules deny with 401; resolution failures are errors.
pub(crate) fn coverage_decision(
    result: Result<(), EscalationError>,
) -> Result<AdmissionDecision, AdmissionError> {
    match result {
        Ok(()) => Ok(AdmissionDecision::Allowed),
        Err(err @ EscalationError::Uncovered {
            ..
        }) => Ok(AdmissionDecision::unauthorized(err.to_string())),
        Err(EscalationError::Resolution {
            source, ..
        }) => Err(AdmissionError::Resolve(source)),
    }
}

/// Splits a resolution result: missing objects deny with 400, other
/// failures are errors.
pub(crate) fn resolved_or_denied(
    result: Result<Vec<PolicyRule>, ResolveError>,
) -> Result<Result<Vec<PolicyRule>, AdmissionDecision>, AdmissionError> {
    match result {
        Ok(rules) => Ok(Ok(rules)),
        Err(err) if err.is_not_found() => Ok(Err(AdmissionDecision::bad_request(err.to_string()))),
        Err(err) => Err(AdmissionError::Resolve(err)),
    }
}

/// Returns a 400 denial for the first structurally invalid rule.
pub(crate) fn invalid_rule(rules: &[PolicyRule]) -> Option<AdmissionDecision> {
    rules.iter().find_map(|rule| {
        rule.validate()
            .err()
            .map(|err| AdmissionDecision::bad_request(format!("invalid rule {rule}: {err}")))
    })
}

// grant-gate-admission/src/resources/global_role_binding.rs
// ============================================================================
// Module: Global Role Binding Validator
// Description: Admission checks for global role binding writes.
// Purpose: Reject bindings to global roles the requester could not create.
// Dependencies: async-trait, grant-gate-core
// ============================================================================

//! ## Overview
//! Binding a global role grants everything the role grants, so the bound
//! role is checked exactly as a global role write would be.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use grant_gate_core::GlobalRole;
use grant_gate_core::GlobalRoleBinding;
use grant_gate_core::ObjectCache;

use crate::admitter::AdmissionDecision;
use crate::admitter::AdmissionError;
use crate::admitter::ValidatingAdmitter;
use crate::request::AdmissionRequest;
use crate::request::Operation;
use crate::resources::EscalationGuard;
use crate::resources::GLOBAL_ROLE_BINDINGS;
use crate::resources::global_role::GlobalGrantCheck;

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Validates global role binding creates and updates.
pub struct GlobalRoleBindingValidator {
    /// Global role lookup.
    roles: Arc<dyn ObjectCache<GlobalRole>>,
    /// Grant check.
    grants: GlobalGrantCheck,
    /// Escalate-verb bypass.
    guard: EscalationGuard,
}

impl GlobalRoleBindingValidator {
    /// Creates a validator.
    #[must_use]
    pub fn new(
        roles: Arc<dyn ObjectCache<GlobalRole>>,
        grants: GlobalGrantCheck,
        guard: EscalationGuard,
    ) -> Self {
        Self {
            roles,
            grants,
            guard,
        }
    }

    /// Checks a create or update.
    async fn admit_write(
        &self,
        request: &AdmissionRequest,
    ) -> Result<AdmissionDecision, AdmissionError> {
        let binding: GlobalRoleBinding = request.decode_object()?;
        if let Err(err) = binding.subject.subject_key() {
            return Ok(AdmissionDecision::bad_request(err.to_string()));
        }
        let name = binding.global_role_name.as_str();
        if name.is_empty() {
            return Ok(AdmissionDecision::bad_request("globalRoleName must be set"));
        }
        let role = match self.roles.get(name) {
            Ok(role) => role,
            Err(err) if err.is_not_found() => {
                return Ok(AdmissionDecision::bad_request(format!(
                    "global role \"{name}\" not found"
                )));
            }
            Err(err) => return Err(err.into()),
        };
        if self.guard.bypass(&request.user_info, GLOBAL_ROLE_BINDINGS, "").await {
            return Ok(AdmissionDecision::Allowed);
        }
        self.grants.check(&request.user_info, &role)
    }
}

#[async_trait]
impl ValidatingAdmitter for GlobalRoleBindingValidator {
    fn name(&self) -> &'static str {
        "global-role-binding-validator"
    }

    async fn admit(&self, request: &AdmissionRequest) -> Result<AdmissionDecision, AdmissionError> {
        match request.operation {
            Operation::Create | Operation::Update => self.admit_write(request).await,
            Operation::Delete | Operation::Connect => Ok(AdmissionDecision::Allowed),
        }
    }
}

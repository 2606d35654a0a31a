// grant-gate-admission/src/resources/global_role.rs
// ============================================================================
// Module: Global Role Validator
// Description: Admission checks for global role writes.
// Purpose: Reject global roles granting rules the requester does not hold.
// Dependencies: async-trait, grant-gate-core
// ============================================================================

//! ## Overview
//! A global role grants two rule sets: rules on the management cluster
//! (including fleet workspace permissions) and rules on every downstream
//! cluster. Each set is checked against the matching requester rules.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use grant_gate_core::GlobalRole;
use grant_gate_core::GlobalRoleResolver;
use grant_gate_core::RuleResolver;
use grant_gate_core::UserInfo;
use grant_gate_core::confirm_no_escalation;

use crate::admitter::AdmissionDecision;
use crate::admitter::AdmissionError;
use crate::admitter::ValidatingAdmitter;
use crate::request::AdmissionRequest;
use crate::request::Operation;
use crate::resources::EscalationGuard;
use crate::resources::GLOBAL_ROLES;
use crate::resources::coverage_decision;
use crate::resources::invalid_rule;
use crate::resources::resolved_or_denied;

// ============================================================================
// SECTION: Grant Check
// ============================================================================

/// Checks the rules a global role grants against the requester's rules.
#[derive(Clone)]
pub struct GlobalGrantCheck {
    /// Global role projections.
    roles: GlobalRoleResolver,
    /// Requester rules on the management cluster.
    global_held: Arc<dyn RuleResolver>,
    /// Requester rules on downstream clusters.
    cluster_held: Arc<dyn RuleResolver>,
}

impl GlobalGrantCheck {
    /// Creates a grant check.
    #[must_use]
    pub fn new(
        roles: GlobalRoleResolver,
        global_held: Arc<dyn RuleResolver>,
        cluster_held: Arc<dyn RuleResolver>,
    ) -> Self {
        Self {
            roles,
            global_held,
            cluster_held,
        }
    }

    /// Returns the global role projections.
    #[must_use]
    pub const fn roles(&self) -> &GlobalRoleResolver {
        &self.roles
    }

    /// Denies when `user` does not hold every rule `role` grants.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] when requester rules cannot be resolved.
    pub fn check(
        &self,
        user: &UserInfo,
        role: &GlobalRole,
    ) -> Result<AdmissionDecision, AdmissionError> {
        let cluster_rules =
            match resolved_or_denied(self.roles.cluster_rules_from_role(Some(role)))? {
                Ok(rules) => rules,
                Err(denied) => return Ok(denied),
            };

        let mut global_rules = self.roles.global_rules_from_role(Some(role));
        global_rules.extend(self.roles.fleet_workspace_permissions_resource_rules_from_role(Some(role)));
        global_rules.extend(self.roles.fleet_workspace_permissions_workspace_verbs_from_role(Some(role)));

        let decision = coverage_decision(confirm_no_escalation(
            user,
            &global_rules,
            "",
            self.global_held.as_ref(),
        ))?;
        if !decision.is_allowed() {
            return Ok(decision);
        }
        coverage_decision(confirm_no_escalation(user, &cluster_rules, "", self.cluster_held.as_ref()))
    }
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Validates global role creates and updates.
pub struct GlobalRoleValidator {
    /// Grant check.
    grants: GlobalGrantCheck,
    /// Escalate-verb bypass.
    guard: EscalationGuard,
}

impl GlobalRoleValidator {
    /// Creates a validator.
    #[must_use]
    pub const fn new(grants: GlobalGrantCheck, guard: EscalationGuard) -> Self {
        Self {
            grants,
            guard,
        }
    }

    /// Checks a create or update.
    async fn admit_write(
        &self,
        request: &AdmissionRequest,
    ) -> Result<AdmissionDecision, AdmissionError> {
        let role: GlobalRole = request.decode_object()?;
        if let Some(denied) = invalid_rule(&role.rules) {
            return Ok(denied);
        }
        if let Some(fleet) = &role.inherited_fleet_workspace_permissions
            && let Some(denied) = invalid_rule(&fleet.resource_rules)
        {
            return Ok(denied);
        }
        if self.guard.bypass(&request.user_info, GLOBAL_ROLES, "").await {
            // Dangling inherited templates are still rejected.
            return match resolved_or_denied(self.grants.roles().cluster_rules_from_role(Some(&role)))? {
                Ok(_) => Ok(AdmissionDecision::Allowed),
                Err(denied) => Ok(denied),
            };
        }
        self.grants.check(&request.user_info, &role)
    }
}

#[async_trait]
impl ValidatingAdmitter for GlobalRoleValidator {
    fn name(&self) -> &'static str {
        "global-role-validator"
    }

    async fn admit(&self, request: &AdmissionRequest) -> Result<AdmissionDecision, AdmissionError> {
        match request.operation {
            Operation::Create | Operation::Update => self.admit_write(request).await,
            Operation::Delete | Operation::Connect => Ok(AdmissionDecision::Allowed),
        }
    }
}

// grant-gate-admission/src/resources/role_template.rs
// ============================================================================
// Module: Role Template Validator
// Description: Admission checks for role template writes and deletes.
// Purpose: Reject cyclic, dangling, or escalating role templates.
// Dependencies: async-trait, grant-gate-core
// ============================================================================

//! ## Overview
//! Writes are checked for content, rule shape, inheritance cycles, and
//! dangling references before the escalation check runs at the cluster-wide
//! scope. Deletes are refused while another template still inherits the
//! target.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use grant_gate_core::CacheError;
use grant_gate_core::CircularRefError;
use grant_gate_core::RoleTemplate;
use grant_gate_core::RoleTemplateResolver;
use grant_gate_core::RuleResolver;
use grant_gate_core::check_circular_ref;
use grant_gate_core::confirm_no_escalation;
use grant_gate_core::runtime::register_inherited_index;
use grant_gate_core::runtime::templates_inheriting;

use crate::admitter::AdmissionDecision;
use crate::admitter::AdmissionError;
use crate::admitter::ValidatingAdmitter;
use crate::request::AdmissionRequest;
use crate::request::Operation;
use crate::resources::EscalationGuard;
use crate::resources::ROLE_TEMPLATES;
use crate::resources::coverage_decision;
use crate::resources::invalid_rule;
use crate::resources::resolved_or_denied;

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Validates role template creates, updates, and deletes.
pub struct RoleTemplateValidator {
    /// Template flattening.
    templates: RoleTemplateResolver,
    /// Requester rules at the cluster-wide scope.
    held: Arc<dyn RuleResolver>,
    /// Escalate-verb bypass.
    guard: EscalationGuard,
}

impl RoleTemplateValidator {
    /// Creates the validator and registers the inherited-name index.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the index cannot be registered.
    pub fn new(
        templates: RoleTemplateResolver,
        held: Arc<dyn RuleResolver>,
        guard: EscalationGuard,
    ) -> Result<Self, CacheError> {
        register_inherited_index(templates.template_cache().as_ref())?;
        Ok(Self {
            templates,
            held,
            guard,
        })
    }

    /// Checks a create or update.
    async fn admit_write(
        &self,
        request: &AdmissionRequest,
    ) -> Result<AdmissionDecision, AdmissionError> {
        let template: RoleTemplate = request.decode_object()?;
        if template.rules.is_empty() && template.role_template_names.is_empty() && !template.external
        {
            return Ok(AdmissionDecision::bad_request(format!(
                "role template \"{}\" must define rules, inherit role templates, or be external",
                template.name()
            )));
        }
        if let Some(denied) =
            invalid_rule(&template.rules).or_else(|| invalid_rule(&template.external_rules))
        {
            return Ok(denied);
        }

        match check_circular_ref(self.templates.template_cache().as_ref(), &template) {
            Ok(None) => {}
            Ok(Some(conflict)) => {
                return Ok(AdmissionDecision::bad_request(format!(
                    "circular reference: role template \"{}\" closes an inheritance cycle \
                     reachable from \"{}\"",
                    conflict.name(),
                    template.name()
                )));
            }
            Err(CircularRefError::TemplateNotFound(name)) => {
                return Ok(AdmissionDecision::bad_request(format!(
                    "role template \"{name}\" not found"
                )));
            }
            Err(CircularRefError::Cache(err)) => return Err(err.into()),
        }

        let rules = match resolved_or_denied(self.templates.rules_from_template(&template))? {
            Ok(rules) => rules,
            Err(denied) => return Ok(denied),
        };
        if self.guard.bypass(&request.user_info, ROLE_TEMPLATES, "").await {
            return Ok(AdmissionDecision::Allowed);
        }
        coverage_decision(confirm_no_escalation(&request.user_info, &rules, "", self.held.as_ref()))
    }

    /// Checks a delete.
    fn admit_delete(&self, request: &AdmissionRequest) -> Result<AdmissionDecision, AdmissionError> {
        let name = if request.name.is_empty() {
            request.decode_old_object::<RoleTemplate>()?.metadata.name
        } else {
            request.name.clone()
        };
        let inheritors = templates_inheriting(self.templates.template_cache().as_ref(), &name)?;
        if inheritors.is_empty() {
            return Ok(AdmissionDecision::Allowed);
        }
        Ok(AdmissionDecision::bad_request(format!(
            "role template \"{name}\" is inherited by [{}]",
            inheritors.join(", ")
        )))
    }
}

#[async_trait]
impl ValidatingAdmitter for RoleTemplateValidator {
    fn name(&self) -> &'static str {
        "role-template-validator"
    }

    async fn admit(&self, request: &AdmissionRequest) -> Result<AdmissionDecision, AdmissionError> {
        match request.operation {
            Operation::Create | Operation::Update => self.admit_write(request).await,
            Operation::Delete => self.admit_delete(request),
            Operation::Connect => Ok(AdmissionDecision::Allowed),
        }
    }
}

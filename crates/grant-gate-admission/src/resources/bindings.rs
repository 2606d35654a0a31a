// grant-gate-admission/src/resources/bindings.rs
// ============================================================================
// Module: Role Template Binding Validators
// Description: Admission checks for cluster and project template bindings.
// Purpose: Reject bindings that grant more than the requester holds.
// Dependencies: async-trait, grant-gate-core, serde
// ============================================================================

//! ## Overview
//! Cluster and project bindings share one validator parameterized by the
//! binding kind. The referenced template must exist, be unlocked for new
//! bindings, and declare the context matching the binding kind. The granted
//! rules are then checked against the requester's rules at the binding scope.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use grant_gate_core::BindingSubject;
use grant_gate_core::ClusterRoleTemplateBinding;
use grant_gate_core::ProjectRoleTemplateBinding;
use grant_gate_core::RoleTemplateResolver;
use grant_gate_core::RuleResolver;
use grant_gate_core::TemplateContext;
use grant_gate_core::confirm_no_escalation;
use grant_gate_core::runtime::TemplateBinding;
use serde::de::DeserializeOwned;

use crate::admitter::AdmissionDecision;
use crate::admitter::AdmissionError;
use crate::admitter::ValidatingAdmitter;
use crate::request::AdmissionRequest;
use crate::request::Operation;
use crate::resources::CLUSTER_ROLE_TEMPLATE_BINDINGS;
use crate::resources::EscalationGuard;
use crate::resources::PROJECT_ROLE_TEMPLATE_BINDINGS;
use crate::resources::coverage_decision;
use crate::resources::resolved_or_denied;

// ============================================================================
// SECTION: Binding Kinds
// ============================================================================

/// Binding kind accepted by [`BindingValidator`].
pub trait BindingKind: TemplateBinding + DeserializeOwned {
    /// Management resource name.
    const RESOURCE: &'static str;
    /// Required template context.
    const CONTEXT: TemplateContext;
    /// Field carrying the scope key.
    const SCOPE_FIELD: &'static str;
    /// Validator name used in audit events.
    const VALIDATOR: &'static str;

    /// Returns the bound subject.
    fn subject(&self) -> &BindingSubject;
}

impl BindingKind for ClusterRoleTemplateBinding {
    const RESOURCE: &'static str = CLUSTER_ROLE_TEMPLATE_BINDINGS;
    const CONTEXT: TemplateContext = TemplateContext::Cluster;
    const SCOPE_FIELD: &'static str = "clusterName";
    const VALIDATOR: &'static str = "crtb-validator";

    fn subject(&self) -> &BindingSubject {
        &self.subject
    }
}

impl BindingKind for ProjectRoleTemplateBinding {
    const RESOURCE: &'static str = PROJECT_ROLE_TEMPLATE_BINDINGS;
    const CONTEXT: TemplateContext = TemplateContext::Project;
    const SCOPE_FIELD: &'static str = "projectName";
    const VALIDATOR: &'static str = "prtb-validator";

    fn subject(&self) -> &BindingSubject {
        &self.subject
    }
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Validates role template binding creates and updates.
pub struct BindingValidator<B> {
    /// Template flattening.
    templates: RoleTemplateResolver,
    /// Requester rules at the binding scope.
    held: Arc<dyn RuleResolver>,
    /// Escalate-verb bypass.
    guard: EscalationGuard,
    /// Binding kind marker.
    kind: PhantomData<fn() -> B>,
}

/// Cluster role template binding validator.
pub type CrtbValidator = BindingValidator<ClusterRoleTemplateBinding>;
/// Project role template binding validator.
pub type PrtbValidator = BindingValidator<ProjectRoleTemplateBinding>;

impl<B: BindingKind> BindingValidator<B> {
    /// Creates a validator.
    #[must_use]
    pub fn new(
        templates: RoleTemplateResolver,
        held: Arc<dyn RuleResolver>,
        guard: EscalationGuard,
    ) -> Self {
        Self {
            templates,
            held,
            guard,
            kind: PhantomData,
        }
    }

    /// Checks a create or update.
    async fn admit_write(
        &self,
        request: &AdmissionRequest,
    ) -> Result<AdmissionDecision, AdmissionError> {
        let binding: B = request.decode_object()?;
        if let Err(err) = binding.subject().subject_key() {
            return Ok(AdmissionDecision::bad_request(err.to_string()));
        }
        let scope = binding.scope_key();
        if scope.is_empty() {
            return Ok(AdmissionDecision::bad_request(format!("{} must be set", B::SCOPE_FIELD)));
        }
        let name = binding.template_name();
        if name.is_empty() {
            return Ok(AdmissionDecision::bad_request("roleTemplateName must be set"));
        }

        let template = match self.templates.template_cache().get(name) {
            Ok(template) => template,
            Err(err) if err.is_not_found() => {
                return Ok(AdmissionDecision::bad_request(format!(
                    "role template \"{name}\" not found"
                )));
            }
            Err(err) => return Err(err.into()),
        };
        if template.locked && request.operation == Operation::Create {
            return Ok(AdmissionDecision::bad_request(format!(
                "role template \"{name}\" is locked and cannot be bound"
            )));
        }
        if template.context != B::CONTEXT {
            return Ok(AdmissionDecision::bad_request(format!(
                "role template \"{name}\" has context \"{}\" but {} requires \"{}\"",
                template.context.as_str(),
                B::RESOURCE,
                B::CONTEXT.as_str()
            )));
        }

        let rules = match resolved_or_denied(self.templates.rules_from_template(&template))? {
            Ok(rules) => rules,
            Err(denied) => return Ok(denied),
        };
        if self.guard.bypass(&request.user_info, B::RESOURCE, scope).await {
            return Ok(AdmissionDecision::Allowed);
        }
        coverage_decision(confirm_no_escalation(
            &request.user_info,
            &rules,
            scope,
            self.held.as_ref(),
        ))
    }
}

#[async_trait]
impl<B: BindingKind> ValidatingAdmitter for BindingValidator<B> {
    fn name(&self) -> &'static str {
        B::VALIDATOR
    }

    async fn admit(&self, request: &AdmissionRequest) -> Result<AdmissionDecision, AdmissionError> {
        match request.operation {
            Operation::Create | Operation::Update => self.admit_write(request).await,
            Operation::Delete | Operation::Connect => Ok(AdmissionDecision::Allowed),
        }
    }
}

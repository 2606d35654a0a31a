// grant-gate-admission/src/engine.rs
// ============================================================================
// Module: Policy Engine Assembly
// Description: Wires caches, resolvers, and admitters into a dispatcher.
// Purpose: Build a ready-to-serve admission handler from configuration.
// Dependencies: grant-gate-config, grant-gate-core
// ============================================================================

//! ## Overview
//! Resolvers are composed per check:
//! - binding checks see native RBAC, cluster and project bindings, and the
//!   downstream-cluster rules of global role bindings;
//! - role template checks see native RBAC and both global role projections;
//! - global role checks compare management-cluster rules and downstream
//!   rules separately.
//!
//! Without an explicit permission checker the escalate-verb check answers
//! from locally resolved rules.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use grant_gate_config::GrantGateConfig;
use grant_gate_core::AggregateRuleResolver;
use grant_gate_core::ClusterRole;
use grant_gate_core::ClusterRoleBinding;
use grant_gate_core::ClusterRoleTemplateBinding;
use grant_gate_core::CrtbRuleResolver;
use grant_gate_core::Feature;
use grant_gate_core::GlobalRole;
use grant_gate_core::GlobalRoleBinding;
use grant_gate_core::GlobalRoleResolver;
use grant_gate_core::GrbClusterRuleResolver;
use grant_gate_core::GrbGlobalRuleResolver;
use grant_gate_core::InMemoryCache;
use grant_gate_core::NativeRbacResolver;
use grant_gate_core::ObjectCache;
use grant_gate_core::PermissionChecker;
use grant_gate_core::ProjectRoleTemplateBinding;
use grant_gate_core::PrtbRuleResolver;
use grant_gate_core::Role;
use grant_gate_core::RoleBinding;
use grant_gate_core::RoleTemplate;
use grant_gate_core::RoleTemplateResolver;
use grant_gate_core::RuleBasedPermissionChecker;
use grant_gate_core::RuleResolver;

use crate::admitter::AdmissionError;
use crate::admitter::Admitter;
use crate::audit::AdmissionAuditSink;
use crate::dispatch::AdmissionHandler;
use crate::resources::CLUSTER_ROLE_TEMPLATE_BINDINGS;
use crate::resources::EscalationGuard;
use crate::resources::GLOBAL_ROLE_BINDINGS;
use crate::resources::GLOBAL_ROLES;
use crate::resources::PROJECT_ROLE_TEMPLATE_BINDINGS;
use crate::resources::ROLE_TEMPLATES;
use crate::resources::bindings::CrtbValidator;
use crate::resources::bindings::PrtbValidator;
use crate::resources::creator::CreatorIdMutator;
use crate::resources::global_role::GlobalGrantCheck;
use crate::resources::global_role::GlobalRoleValidator;
use crate::resources::global_role_binding::GlobalRoleBindingValidator;
use crate::resources::management_resource;
use crate::resources::role_template::RoleTemplateValidator;

// ============================================================================
// SECTION: Caches
// ============================================================================

/// Read-only lookups backing the policy engine.
#[derive(Clone)]
pub struct ClusterCaches {
    /// Role templates.
    pub role_templates: Arc<dyn ObjectCache<RoleTemplate>>,
    /// Cluster roles.
    pub cluster_roles: Arc<dyn ObjectCache<ClusterRole>>,
    /// Namespaced roles.
    pub roles: Arc<dyn ObjectCache<Role>>,
    /// Namespaced role bindings.
    pub role_bindings: Arc<dyn ObjectCache<RoleBinding>>,
    /// Cluster role bindings.
    pub cluster_role_bindings: Arc<dyn ObjectCache<ClusterRoleBinding>>,
    /// Cluster role template bindings.
    pub cluster_role_template_bindings: Arc<dyn ObjectCache<ClusterRoleTemplateBinding>>,
    /// Project role template bindings.
    pub project_role_template_bindings: Arc<dyn ObjectCache<ProjectRoleTemplateBinding>>,
    /// Global roles.
    pub global_roles: Arc<dyn ObjectCache<GlobalRole>>,
    /// Global role bindings.
    pub global_role_bindings: Arc<dyn ObjectCache<GlobalRoleBinding>>,
    /// Feature flags.
    pub features: Arc<dyn ObjectCache<Feature>>,
}

impl Default for ClusterCaches {
    fn default() -> Self {
        Self {
            role_templates: Arc::new(InMemoryCache::new()),
            cluster_roles: Arc::new(InMemoryCache::new()),
            roles: Arc::new(InMemoryCache::new()),
            role_bindings: Arc::new(InMemoryCache::new()),
            cluster_role_bindings: Arc::new(InMemoryCache::new()),
            cluster_role_template_bindings: Arc::new(InMemoryCache::new()),
            project_role_template_bindings: Arc::new(InMemoryCache::new()),
            global_roles: Arc::new(InMemoryCache::new()),
            global_role_bindings: Arc::new(InMemoryCache::new()),
            features: Arc::new(InMemoryCache::new()),
        }
    }
}

// ============================================================================
// SECTION: Assembly
// ============================================================================

/// Builds the admission handler with every resource admitter registered.
///
/// # Errors
///
/// Returns [`AdmissionError`] when an index cannot be registered on a cache.
pub fn build_handler(
    caches: &ClusterCaches,
    config: &GrantGateConfig,
    checker: Option<Arc<dyn PermissionChecker>>,
    audit: Arc<dyn AdmissionAuditSink>,
) -> Result<AdmissionHandler, AdmissionError> {
    let templates = RoleTemplateResolver::new(
        Arc::clone(&caches.role_templates),
        Arc::clone(&caches.cluster_roles),
        Arc::clone(&caches.features),
    )
    .with_external_rules_default(config.features.external_rules_default);
    let global_roles = GlobalRoleResolver::new(templates.clone()).with_owner_equivalents(
        config.global_roles.owner_equivalent_roles.iter().cloned(),
        config.global_roles.cluster_owner_template.clone(),
    );

    let native: Arc<dyn RuleResolver> = Arc::new(NativeRbacResolver::new(
        Arc::clone(&caches.roles),
        Arc::clone(&caches.cluster_roles),
        Arc::clone(&caches.role_bindings),
        Arc::clone(&caches.cluster_role_bindings),
    )?);
    let crtb: Arc<dyn RuleResolver> = Arc::new(CrtbRuleResolver::new(
        Arc::clone(&caches.cluster_role_template_bindings),
        templates.clone(),
    )?);
    let prtb: Arc<dyn RuleResolver> = Arc::new(PrtbRuleResolver::new(
        Arc::clone(&caches.project_role_template_bindings),
        templates.clone(),
    )?);
    let grb_cluster: Arc<dyn RuleResolver> = Arc::new(GrbClusterRuleResolver::new(
        Arc::clone(&caches.global_role_bindings),
        Arc::clone(&caches.global_roles),
        global_roles.clone(),
    )?);
    let grb_global: Arc<dyn RuleResolver> = Arc::new(GrbGlobalRuleResolver::new(
        Arc::clone(&caches.global_role_bindings),
        Arc::clone(&caches.global_roles),
        global_roles.clone(),
    )?);

    let binding_held = aggregate(&[&native, &crtb, &prtb, &grb_cluster]);
    let template_held = aggregate(&[&native, &grb_global, &grb_cluster]);
    let global_held = aggregate(&[&native, &grb_global]);
    let cluster_held = aggregate(&[&native, &grb_cluster]);

    let checker: Arc<dyn PermissionChecker> = match checker {
        Some(checker) => checker,
        None => Arc::new(RuleBasedPermissionChecker::new(aggregate(&[
            &native,
            &crtb,
            &prtb,
            &grb_global,
        ]))),
    };
    let guard = EscalationGuard::new(
        checker,
        config.escalation.permission_check_timeout(),
        Arc::clone(&audit),
    );
    let grants = GlobalGrantCheck::new(global_roles, global_held, cluster_held);

    let mut handler = AdmissionHandler::new(config.break_glass.clone(), audit);
    handler.register(
        management_resource(ROLE_TEMPLATES),
        Admitter::Validating(Arc::new(RoleTemplateValidator::new(
            templates.clone(),
            template_held,
            guard.clone(),
        )?)),
    )?;
    handler.register(
        management_resource(ROLE_TEMPLATES),
        Admitter::Mutating(Arc::new(CreatorIdMutator::new("role-template-mutator"))),
    )?;
    handler.register(
        management_resource(CLUSTER_ROLE_TEMPLATE_BINDINGS),
        Admitter::Validating(Arc::new(CrtbValidator::new(
            templates.clone(),
            Arc::clone(&binding_held),
            guard.clone(),
        ))),
    )?;
    handler.register(
        management_resource(PROJECT_ROLE_TEMPLATE_BINDINGS),
        Admitter::Validating(Arc::new(PrtbValidator::new(templates, binding_held, guard.clone()))),
    )?;
    handler.register(
        management_resource(GLOBAL_ROLES),
        Admitter::Validating(Arc::new(GlobalRoleValidator::new(grants.clone(), guard.clone()))),
    )?;
    handler.register(
        management_resource(GLOBAL_ROLES),
        Admitter::Mutating(Arc::new(CreatorIdMutator::new("global-role-mutator"))),
    )?;
    handler.register(
        management_resource(GLOBAL_ROLE_BINDINGS),
        Admitter::Validating(Arc::new(GlobalRoleBindingValidator::new(
            Arc::clone(&caches.global_roles),
            grants,
            guard,
        ))),
    )?;
    Ok(handler)
}

/// Aggregates the given resolvers.
fn aggregate(resolvers: &[&Arc<dyn RuleResolver>]) -> Arc<dyn RuleResolver> {
    Arc::new(AggregateRuleResolver::new(resolvers.iter().map(|resolver| Arc::clone(*resolver)).collect()))
}

// grant-gate-core/src/runtime/bindings.rs
// ============================================================================
// Module: Binding Rule Resolvers
// Description: Rule resolvers backed by platform binding objects.
// Purpose: Answer "rules held by a requester at a scope" from CRTBs, PRTBs, and GRBs.
// Dependencies: crate::core, crate::interfaces, crate::runtime::{global, template}
// ============================================================================

//! ## Overview
//! Each resolver registers a secondary index on its binding cache once, at
//! construction, and answers queries by looking up every subject key of the
//! requester. The cache keeps the index current; resolvers never invalidate.
//!
//! A binding whose template or global role no longer exists is skipped so a
//! stale binding cannot fail unrelated escalation checks. The same holds for
//! a bound global role whose inherited templates were deleted. Other failures
//! are collected next to the rules that did resolve.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::ClusterRoleTemplateBinding;
use crate::core::GlobalRole;
use crate::core::GlobalRoleBinding;
use crate::core::PolicyRule;
use crate::core::ProjectRoleTemplateBinding;
use crate::core::UserInfo;
use crate::core::subject_scope_key;
use crate::interfaces::CacheError;
use crate::interfaces::IndexFn;
use crate::interfaces::ObjectCache;
use crate::interfaces::ResolveError;
use crate::interfaces::ResolvedRules;
use crate::interfaces::RuleResolver;
use crate::interfaces::ensure_indexer;
use crate::runtime::global::GlobalRoleResolver;
use crate::runtime::template::RoleTemplateResolver;

// ============================================================================
// SECTION: Index Names
// ============================================================================

/// CRTB index keyed by [`subject_scope_key`] of subject and cluster.
pub const CRTB_BY_SUBJECT_SCOPE_INDEX: &str = "crtb-by-subject-scope";
/// PRTB index keyed by [`subject_scope_key`] of subject and `cluster:project`.
pub const PRTB_BY_SUBJECT_SCOPE_INDEX: &str = "prtb-by-subject-scope";
/// GRB index keyed by subject.
pub const GRB_BY_SUBJECT_INDEX: &str = "grb-by-subject";

// ============================================================================
// SECTION: Template Bindings
// ============================================================================

/// Binding that grants one role template at one scope.
pub trait TemplateBinding: Clone + Send + Sync + 'static {
    /// Name of the secondary index registered for this binding kind.
    const INDEX: &'static str;

    /// Returns the subject key, or `None` when the subject is malformed.
    fn binding_subject_key(&self) -> Option<String>;

    /// Returns the scope key the binding applies at.
    fn scope_key(&self) -> &str;

    /// Returns the granted role template name.
    fn template_name(&self) -> &str;
}

impl TemplateBinding for ClusterRoleTemplateBinding {
    const INDEX: &'static str = CRTB_BY_SUBJECT_SCOPE_INDEX;

    fn binding_subject_key(&self) -> Option<String> {
        self.subject.subject_key().ok()
    }

    fn scope_key(&self) -> &str {
        &self.cluster_name
    }

    fn template_name(&self) -> &str {
        &self.role_template_name
    }
}

impl TemplateBinding for ProjectRoleTemplateBinding {
    const INDEX: &'static str = PRTB_BY_SUBJECT_SCOPE_INDEX;

    fn binding_subject_key(&self) -> Option<String> {
        self.subject.subject_key().ok()
    }

    fn scope_key(&self) -> &str {
        &self.project_name
    }

    fn template_name(&self) -> &str {
        &self.role_template_name
    }
}

/// Index function mapping a template binding to its subject and scope key.
fn template_binding_index<B: TemplateBinding>(binding: &B) -> Vec<String> {
    binding
        .binding_subject_key()
        .map(|subject| vec![subject_scope_key(&subject, binding.scope_key())])
        .unwrap_or_default()
}

/// Resolves rules from role template bindings of one kind.
pub struct BindingRuleResolver<B> {
    /// Indexed binding lookup.
    bindings: Arc<dyn ObjectCache<B>>,
    /// Template flattener.
    templates: RoleTemplateResolver,
}

/// Resolver over cluster role template bindings; scopes are cluster names.
pub type CrtbRuleResolver = BindingRuleResolver<ClusterRoleTemplateBinding>;
/// Resolver over project role template bindings; scopes are `cluster:project`.
pub type PrtbRuleResolver = BindingRuleResolver<ProjectRoleTemplateBinding>;

impl<B: TemplateBinding> BindingRuleResolver<B> {
    /// Creates a resolver and registers its index on the binding cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the index cannot be registered.
    pub fn new(
        bindings: Arc<dyn ObjectCache<B>>,
        templates: RoleTemplateResolver,
    ) -> Result<Self, CacheError> {
        let index: IndexFn<B> = Arc::new(template_binding_index::<B>);
        ensure_indexer(bindings.as_ref(), B::INDEX, index)?;
        Ok(Self {
            bindings,
            templates,
        })
    }
}

impl<B: TemplateBinding> RuleResolver for BindingRuleResolver<B> {
    fn rules_for(&self, user: &UserInfo, scope: &str) -> Result<Vec<PolicyRule>, ResolveError> {
        self.resolve(user, scope).into_result()
    }

    fn resolve(&self, user: &UserInfo, scope: &str) -> ResolvedRules {
        let mut resolved = ResolvedRules::default();
        for subject in user.subject_keys() {
            let key = subject_scope_key(&subject, scope);
            let bindings = match self.bindings.get_by_index(B::INDEX, &key) {
                Ok(bindings) => bindings,
                Err(err) => {
                    resolved.errors.push(err.into());
                    continue;
                }
            };
            for binding in bindings {
                let granted = self.templates.rules_from_template_name(binding.template_name());
                resolved.absorb(skip_not_found(granted));
            }
        }
        resolved
    }
}

/// Treats a reference to a deleted object as granting nothing.
fn skip_not_found(
    result: Result<Vec<PolicyRule>, ResolveError>,
) -> Result<Vec<PolicyRule>, ResolveError> {
    match result {
        Err(err) if err.is_not_found() => Ok(Vec::new()),
        other => other,
    }
}

// ============================================================================
// SECTION: Global Role Bindings
// ============================================================================

/// Index function mapping a global role binding to its subject key.
fn grb_subject_index(binding: &GlobalRoleBinding) -> Vec<String> {
    binding.subject.subject_key().map(|subject| vec![subject]).unwrap_or_default()
}

/// Shared lookup of the global roles bound to a requester.
#[derive(Clone)]
struct GrbLookup {
    /// Indexed global role binding lookup.
    bindings: Arc<dyn ObjectCache<GlobalRoleBinding>>,
    /// Global role lookup.
    roles: Arc<dyn ObjectCache<GlobalRole>>,
}

impl GrbLookup {
    /// Registers the subject index and returns the lookup.
    fn new(
        bindings: Arc<dyn ObjectCache<GlobalRoleBinding>>,
        roles: Arc<dyn ObjectCache<GlobalRole>>,
    ) -> Result<Self, CacheError> {
        let index: IndexFn<GlobalRoleBinding> = Arc::new(grb_subject_index);
        ensure_indexer(bindings.as_ref(), GRB_BY_SUBJECT_INDEX, index)?;
        Ok(Self {
            bindings,
            roles,
        })
    }

    /// Returns every existing global role bound to the requester.
    ///
    /// Lookup failures are recorded in `errors`; the roles found so far are
    /// still returned.
    fn bound_roles(&self, user: &UserInfo, errors: &mut Vec<ResolveError>) -> Vec<GlobalRole> {
        let mut roles = Vec::new();
        for subject in user.subject_keys() {
            let bindings = match self.bindings.get_by_index(GRB_BY_SUBJECT_INDEX, &subject) {
                Ok(bindings) => bindings,
                Err(err) => {
                    errors.push(err.into());
                    continue;
                }
            };
            for binding in bindings {
                match self.roles.get(&binding.global_role_name) {
                    Ok(role) => roles.push(role),
                    Err(err) if err.is_not_found() => {}
                    Err(err) => errors.push(err.into()),
                }
            }
        }
        roles
    }
}

/// Resolves the downstream-cluster rules granted through global role bindings.
///
/// The rules apply identically at every cluster scope.
pub struct GrbClusterRuleResolver {
    /// Bound role lookup.
    lookup: GrbLookup,
    /// Global role rule derivation.
    resolver: GlobalRoleResolver,
}

impl GrbClusterRuleResolver {
    /// Creates a resolver and registers the subject index.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the index cannot be registered.
    pub fn new(
        bindings: Arc<dyn ObjectCache<GlobalRoleBinding>>,
        roles: Arc<dyn ObjectCache<GlobalRole>>,
        resolver: GlobalRoleResolver,
    ) -> Result<Self, CacheError> {
        Ok(Self {
            lookup: GrbLookup::new(bindings, roles)?,
            resolver,
        })
    }
}

impl RuleResolver for GrbClusterRuleResolver {
    fn rules_for(&self, user: &UserInfo, scope: &str) -> Result<Vec<PolicyRule>, ResolveError> {
        self.resolve(user, scope).into_result()
    }

    fn resolve(&self, user: &UserInfo, _scope: &str) -> ResolvedRules {
        let mut resolved = ResolvedRules::default();
        for role in self.lookup.bound_roles(user, &mut resolved.errors) {
            let granted = self.resolver.cluster_rules_from_role(Some(&role));
            resolved.absorb(skip_not_found(granted));
        }
        resolved
    }
}

/// Resolves the management-cluster rules granted through global role bindings.
///
/// Includes fleet workspace rules, which apply inside every workspace.
pub struct GrbGlobalRuleResolver {
    /// Bound role lookup.
    lookup: GrbLookup,
    /// Global role rule derivation.
    resolver: GlobalRoleResolver,
}

impl GrbGlobalRuleResolver {
    /// Creates a resolver and registers the subject index.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the index cannot be registered.
    pub fn new(
        bindings: Arc<dyn ObjectCache<GlobalRoleBinding>>,
        roles: Arc<dyn ObjectCache<GlobalRole>>,
        resolver: GlobalRoleResolver,
    ) -> Result<Self, CacheError> {
        Ok(Self {
            lookup: GrbLookup::new(bindings, roles)?,
            resolver,
        })
    }
}

impl RuleResolver for GrbGlobalRuleResolver {
    fn rules_for(&self, user: &UserInfo, scope: &str) -> Result<Vec<PolicyRule>, ResolveError> {
        self.resolve(user, scope).into_result()
    }

    fn resolve(&self, user: &UserInfo, _scope: &str) -> ResolvedRules {
        let mut resolved = ResolvedRules::default();
        for role in self.lookup.bound_roles(user, &mut resolved.errors) {
            let role = Some(&role);
            resolved.rules.extend(self.resolver.global_rules_from_role(role));
            resolved
                .rules
                .extend(self.resolver.fleet_workspace_permissions_resource_rules_from_role(role));
            resolved
                .rules
                .extend(self.resolver.fleet_workspace_permissions_workspace_verbs_from_role(role));
        }
        resolved
    }
}

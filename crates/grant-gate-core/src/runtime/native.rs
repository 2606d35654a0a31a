// grant-gate-core/src/runtime/native.rs
// ============================================================================
// Module: Native RBAC Resolver
// Description: Rule resolver over native roles and role bindings.
// Purpose: Report the rules granted by ClusterRoleBindings and RoleBindings.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! ClusterRoleBindings apply at every scope. RoleBindings apply only when
//! their namespace equals the requested scope, and may reference either a
//! Role in that namespace or a ClusterRole. Missing roles are skipped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::ClusterRole;
use crate::core::ClusterRoleBinding;
use crate::core::PolicyRule;
use crate::core::RbacSubject;
use crate::core::Role;
use crate::core::RoleBinding;
use crate::core::RoleRef;
use crate::core::UserInfo;
use crate::core::subject_scope_key;
use crate::interfaces::CacheError;
use crate::interfaces::IndexFn;
use crate::interfaces::ObjectCache;
use crate::interfaces::ResolveError;
use crate::interfaces::ResolvedRules;
use crate::interfaces::RuleResolver;
use crate::interfaces::ensure_indexer;

// ============================================================================
// SECTION: Index Names
// ============================================================================

/// ClusterRoleBinding index keyed by subject.
pub const CRB_BY_SUBJECT_INDEX: &str = "crb-by-subject";
/// RoleBinding index keyed by [`subject_scope_key`] of subject and namespace.
pub const RB_BY_SUBJECT_NAMESPACE_INDEX: &str = "rb-by-subject-namespace";

/// Role reference kind for namespaced roles.
const ROLE_KIND: &str = "Role";
/// Role reference kind for cluster roles.
const CLUSTER_ROLE_KIND: &str = "ClusterRole";

// ============================================================================
// SECTION: Index Functions
// ============================================================================

/// Subject keys of every recognized subject.
fn subject_keys(subjects: &[RbacSubject]) -> Vec<String> {
    subjects.iter().filter_map(RbacSubject::subject_key).collect()
}

/// Index function for ClusterRoleBindings.
fn crb_subject_index(binding: &ClusterRoleBinding) -> Vec<String> {
    subject_keys(&binding.subjects)
}

/// Index function for RoleBindings.
fn rb_subject_namespace_index(binding: &RoleBinding) -> Vec<String> {
    let namespace = binding.metadata.namespace.as_deref().unwrap_or_default();
    subject_keys(&binding.subjects)
        .iter()
        .map(|subject| subject_scope_key(subject, namespace))
        .collect()
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolves rules from native RBAC objects.
pub struct NativeRbacResolver {
    /// Namespaced roles keyed `namespace/name`.
    roles: Arc<dyn ObjectCache<Role>>,
    /// Cluster roles.
    cluster_roles: Arc<dyn ObjectCache<ClusterRole>>,
    /// Namespaced bindings.
    role_bindings: Arc<dyn ObjectCache<RoleBinding>>,
    /// Cluster-wide bindings.
    cluster_role_bindings: Arc<dyn ObjectCache<ClusterRoleBinding>>,
}

impl NativeRbacResolver {
    /// Creates a resolver and registers its binding indexes.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when an index cannot be registered.
    pub fn new(
        roles: Arc<dyn ObjectCache<Role>>,
        cluster_roles: Arc<dyn ObjectCache<ClusterRole>>,
        role_bindings: Arc<dyn ObjectCache<RoleBinding>>,
        cluster_role_bindings: Arc<dyn ObjectCache<ClusterRoleBinding>>,
    ) -> Result<Self, CacheError> {
        let crb_index: IndexFn<ClusterRoleBinding> = Arc::new(crb_subject_index);
        ensure_indexer(cluster_role_bindings.as_ref(), CRB_BY_SUBJECT_INDEX, crb_index)?;
        let rb_index: IndexFn<RoleBinding> = Arc::new(rb_subject_namespace_index);
        ensure_indexer(role_bindings.as_ref(), RB_BY_SUBJECT_NAMESPACE_INDEX, rb_index)?;
        Ok(Self {
            roles,
            cluster_roles,
            role_bindings,
            cluster_role_bindings,
        })
    }

    /// Returns the rules of a referenced role, or nothing when it is missing.
    fn referenced_rules(
        &self,
        role_ref: &RoleRef,
        namespace: &str,
    ) -> Result<Vec<PolicyRule>, CacheError> {
        let found = match role_ref.kind.as_str() {
            CLUSTER_ROLE_KIND => self.cluster_roles.get(&role_ref.name).map(|role| role.rules),
            ROLE_KIND if !namespace.is_empty() => {
                self.roles.get(&format!("{namespace}/{}", role_ref.name)).map(|role| role.rules)
            }
            _ => return Ok(Vec::new()),
        };
        match found {
            Ok(rules) => Ok(rules),
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}

impl RuleResolver for NativeRbacResolver {
    fn rules_for(&self, user: &UserInfo, scope: &str) -> Result<Vec<PolicyRule>, ResolveError> {
        self.resolve(user, scope).into_result()
    }

    fn resolve(&self, user: &UserInfo, scope: &str) -> ResolvedRules {
        let mut resolved = ResolvedRules::default();
        for subject in user.subject_keys() {
            match self.cluster_role_bindings.get_by_index(CRB_BY_SUBJECT_INDEX, &subject) {
                Ok(bindings) => {
                    for binding in bindings {
                        if binding.role_ref.kind == CLUSTER_ROLE_KIND {
                            resolved.absorb(self.referenced_rules(&binding.role_ref, ""));
                        }
                    }
                }
                Err(err) => resolved.errors.push(err.into()),
            }
            if scope.is_empty() {
                continue;
            }
            let key = subject_scope_key(&subject, scope);
            match self.role_bindings.get_by_index(RB_BY_SUBJECT_NAMESPACE_INDEX, &key) {
                Ok(bindings) => {
                    for binding in bindings {
                        resolved.absorb(self.referenced_rules(&binding.role_ref, scope));
                    }
                }
                Err(err) => resolved.errors.push(err.into()),
            }
        }
        resolved
    }
}

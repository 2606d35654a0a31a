// grant-gate-core/src/runtime/global.rs
// ============================================================================
// Module: Global Role Resolver
// Description: Derives management-cluster, downstream-cluster, and fleet rules.
// Purpose: Expose the rule sets a global role grants at each scope.
// Dependencies: crate::core, crate::runtime::template
// ============================================================================

//! ## Overview
//! A global role grants its own rules on the management cluster, the rules of
//! its inherited role templates on every downstream cluster, and optional
//! fleet workspace permissions. Owner-equivalent roles (for example
//! `restricted-admin`) resolve to the cluster owner template on every
//! downstream cluster instead of their inherited templates.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::core::FLEET_WORKSPACES_RESOURCE;
use crate::core::GlobalRole;
use crate::core::MANAGEMENT_API_GROUP;
use crate::core::PolicyRule;
use crate::interfaces::ResolveError;
use crate::runtime::template::RoleTemplateResolver;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Built-in global role treated as owner on every downstream cluster.
pub const RESTRICTED_ADMIN_ROLE: &str = "restricted-admin";
/// Role template granting cluster ownership.
pub const CLUSTER_OWNER_TEMPLATE: &str = "cluster-owner";

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolves the rules granted by global roles.
#[derive(Clone)]
pub struct GlobalRoleResolver {
    /// Template resolver used for inherited cluster roles.
    templates: RoleTemplateResolver,
    /// Global role names treated as cluster owners downstream.
    owner_equivalent_roles: BTreeSet<String>,
    /// Template resolved for owner-equivalent roles.
    cluster_owner_template: String,
}

impl GlobalRoleResolver {
    /// Creates a resolver with the built-in owner-equivalent role set.
    #[must_use]
    pub fn new(templates: RoleTemplateResolver) -> Self {
        Self {
            templates,
            owner_equivalent_roles: BTreeSet::from([RESTRICTED_ADMIN_ROLE.to_string()]),
            cluster_owner_template: CLUSTER_OWNER_TEMPLATE.to_string(),
        }
    }

    /// Returns a copy with custom owner-equivalent roles and owner template.
    #[must_use]
    pub fn with_owner_equivalents<I, S>(mut self, roles: I, owner_template: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.owner_equivalent_roles = roles.into_iter().map(Into::into).collect();
        self.cluster_owner_template = owner_template.into();
        self
    }

    /// Returns the underlying template resolver.
    #[must_use]
    pub const fn template_resolver(&self) -> &RoleTemplateResolver {
        &self.templates
    }

    /// Returns the rules granted on the management cluster.
    #[must_use]
    pub fn global_rules_from_role(&self, role: Option<&GlobalRole>) -> Vec<PolicyRule> {
        role.map_or_else(Vec::new, |role| role.rules.clone())
    }

    /// Returns the rules granted on every downstream cluster.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InheritedTemplate`] naming the first inherited
    /// template that fails to resolve.
    pub fn cluster_rules_from_role(
        &self,
        role: Option<&GlobalRole>,
    ) -> Result<Vec<PolicyRule>, ResolveError> {
        let Some(role) = role else {
            return Ok(Vec::new());
        };
        if self.owner_equivalent_roles.contains(&role.metadata.name) {
            return self.resolve_inherited(&self.cluster_owner_template);
        }
        let mut rules = Vec::new();
        for name in &role.inherited_cluster_roles {
            rules.extend(self.resolve_inherited(name)?);
        }
        Ok(rules)
    }

    /// Returns the rules applied inside every fleet workspace.
    #[must_use]
    pub fn fleet_workspace_permissions_resource_rules_from_role(
        &self,
        role: Option<&GlobalRole>,
    ) -> Vec<PolicyRule> {
        role.and_then(|role| role.inherited_fleet_workspace_permissions.as_ref())
            .map_or_else(Vec::new, |permissions| permissions.resource_rules.clone())
    }

    /// Returns the workspace verbs as a rule over fleet workspace objects.
    #[must_use]
    pub fn fleet_workspace_permissions_workspace_verbs_from_role(
        &self,
        role: Option<&GlobalRole>,
    ) -> Vec<PolicyRule> {
        role.and_then(|role| role.inherited_fleet_workspace_permissions.as_ref())
            .filter(|permissions| !permissions.workspace_verbs.is_empty())
            .map_or_else(Vec::new, |permissions| {
                vec![
                    PolicyRule::new()
                        .with_verbs(permissions.workspace_verbs.iter().cloned())
                        .with_api_groups([MANAGEMENT_API_GROUP])
                        .with_resources([FLEET_WORKSPACES_RESOURCE]),
                ]
            })
    }

    /// Resolves one inherited template, naming it on failure.
    fn resolve_inherited(&self, name: &str) -> Result<Vec<PolicyRule>, ResolveError> {
        self.templates.rules_from_template_name(name).map_err(|err| {
            ResolveError::InheritedTemplate {
                name: name.to_string(),
                source: Box::new(err),
            }
        })
    }
}

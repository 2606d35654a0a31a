// grant-gate-cli/src/snapshot.rs
// ============================================================================
// Module: Cluster Snapshot
// Description: JSON document describing platform state for offline checks.
// Purpose: Seed the in-memory caches the policy engine reads from.
// Dependencies: grant-gate-admission, grant-gate-core, serde
// ============================================================================

//! ## Overview
//! A [`ClusterSnapshot`] lists the objects an admission decision may consult.
//! Every list is optional; an absent list is an empty cache.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use grant_gate_admission::ClusterCaches;
use grant_gate_core::ClusterRole;
use grant_gate_core::ClusterRoleBinding;
use grant_gate_core::ClusterRoleTemplateBinding;
use grant_gate_core::Feature;
use grant_gate_core::GlobalRole;
use grant_gate_core::GlobalRoleBinding;
use grant_gate_core::InMemoryCache;
use grant_gate_core::ProjectRoleTemplateBinding;
use grant_gate_core::Role;
use grant_gate_core::RoleBinding;
use grant_gate_core::RoleTemplate;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Platform state loaded from a snapshot file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ClusterSnapshot {
    /// Role templates.
    pub role_templates: Vec<RoleTemplate>,
    /// Cluster roles.
    pub cluster_roles: Vec<ClusterRole>,
    /// Namespaced roles.
    pub roles: Vec<Role>,
    /// Namespaced role bindings.
    pub role_bindings: Vec<RoleBinding>,
    /// Cluster role bindings.
    pub cluster_role_bindings: Vec<ClusterRoleBinding>,
    /// Cluster role template bindings.
    pub cluster_role_template_bindings: Vec<ClusterRoleTemplateBinding>,
    /// Project role template bindings.
    pub project_role_template_bindings: Vec<ProjectRoleTemplateBinding>,
    /// Global roles.
    pub global_roles: Vec<GlobalRole>,
    /// Global role bindings.
    pub global_role_bindings: Vec<GlobalRoleBinding>,
    /// Feature flags.
    pub features: Vec<Feature>,
}

impl ClusterSnapshot {
    /// Loads every list into its own in-memory cache.
    #[must_use]
    pub fn into_caches(self) -> ClusterCaches {
        ClusterCaches {
            role_templates: Arc::new(InMemoryCache::with_objects(self.role_templates)),
            cluster_roles: Arc::new(InMemoryCache::with_objects(self.cluster_roles)),
            roles: Arc::new(InMemoryCache::with_objects(self.roles)),
            role_bindings: Arc::new(InMemoryCache::with_objects(self.role_bindings)),
            cluster_role_bindings: Arc::new(InMemoryCache::with_objects(
                self.cluster_role_bindings,
            )),
            cluster_role_template_bindings: Arc::new(InMemoryCache::with_objects(
                self.cluster_role_template_bindings,
            )),
            project_role_template_bindings: Arc::new(InMemoryCache::with_objects(
                self.project_role_template_bindings,
            )),
            global_roles: Arc::new(InMemoryCache::with_objects(self.global_roles)),
            global_role_bindings: Arc::new(InMemoryCache::with_objects(self.global_role_bindings)),
            features: Arc::new(InMemoryCache::with_objects(self.features)),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

// grant-gate-admission/tests/common/mod.rs
// ============================================================================
// Module: Common Admission Fixtures
// Description: In-memory cluster state and request builders.
// Purpose: Drive the assembled admission handler end to end.
// Dependencies: grant-gate-admission, grant-gate-core
// ============================================================================

//! ## Overview
//! [`Cluster`] owns one in-memory cache per object kind and assembles a
//! handler over them with a [`MemoryAuditSink`] for inspection.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(clippy::unwrap_used, reason = "Test fixtures are deterministic.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use grant_gate_admission::AdmissionHandler;
use grant_gate_admission::AdmissionRequest;
use grant_gate_admission::ClusterCaches;
use grant_gate_admission::MemoryAuditSink;
use grant_gate_admission::Operation;
use grant_gate_admission::build_handler;
use grant_gate_admission::management_resource;
use grant_gate_config::GrantGateConfig;
use grant_gate_core::BindingSubject;
use grant_gate_core::ClusterRole;
use grant_gate_core::ClusterRoleBinding;
use grant_gate_core::ClusterRoleTemplateBinding;
use grant_gate_core::Feature;
use grant_gate_core::GlobalRole;
use grant_gate_core::GlobalRoleBinding;
use grant_gate_core::InMemoryCache;
use grant_gate_core::ObjectMeta;
use grant_gate_core::PermissionChecker;
use grant_gate_core::PolicyRule;
use grant_gate_core::ProjectRoleTemplateBinding;
use grant_gate_core::RbacSubject;
use grant_gate_core::Role;
use grant_gate_core::RoleBinding;
use grant_gate_core::RoleRef;
use grant_gate_core::RoleTemplate;
use grant_gate_core::TemplateContext;
use grant_gate_core::UserInfo;
use serde::Serialize;

// ============================================================================
// SECTION: Cluster
// ============================================================================

/// In-memory platform state.
#[derive(Default)]
pub struct Cluster {
    pub templates: Arc<InMemoryCache<RoleTemplate>>,
    pub cluster_roles: Arc<InMemoryCache<ClusterRole>>,
    pub roles: Arc<InMemoryCache<Role>>,
    pub role_bindings: Arc<InMemoryCache<RoleBinding>>,
    pub cluster_role_bindings: Arc<InMemoryCache<ClusterRoleBinding>>,
    pub crtbs: Arc<InMemoryCache<ClusterRoleTemplateBinding>>,
    pub prtbs: Arc<InMemoryCache<ProjectRoleTemplateBinding>>,
    pub global_roles: Arc<InMemoryCache<GlobalRole>>,
    pub grbs: Arc<InMemoryCache<GlobalRoleBinding>>,
    pub features: Arc<InMemoryCache<Feature>>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn caches(&self) -> ClusterCaches {
        ClusterCaches {
            role_templates: self.templates.clone(),
            cluster_roles: self.cluster_roles.clone(),
            roles: self.roles.clone(),
            role_bindings: self.role_bindings.clone(),
            cluster_role_bindings: self.cluster_role_bindings.clone(),
            cluster_role_template_bindings: self.crtbs.clone(),
            project_role_template_bindings: self.prtbs.clone(),
            global_roles: self.global_roles.clone(),
            global_role_bindings: self.grbs.clone(),
            features: self.features.clone(),
        }
    }

    /// Builds a handler with default configuration and the local checker.
    pub fn handler(&self) -> (AdmissionHandler, Arc<MemoryAuditSink>) {
        self.handler_with(&GrantGateConfig::default(), None)
    }

    pub fn handler_with(
        &self,
        config: &GrantGateConfig,
        checker: Option<Arc<dyn PermissionChecker>>,
    ) -> (AdmissionHandler, Arc<MemoryAuditSink>) {
        let audit = Arc::new(MemoryAuditSink::new());
        let handler = build_handler(&self.caches(), config, checker, audit.clone()).unwrap();
        (handler, audit)
    }

    pub fn add_template(&self, template: RoleTemplate) {
        self.templates.upsert(template).unwrap();
    }

    pub fn add_global_role(&self, role: GlobalRole) {
        self.global_roles.upsert(role).unwrap();
    }

    /// Grants `user` a cluster role through a cluster role binding.
    pub fn grant_cluster_wide(&self, user: &str, rules: Vec<PolicyRule>) {
        let role_name = format!("{user}-role");
        self.cluster_roles
            .upsert(ClusterRole {
                metadata: ObjectMeta::named(&role_name),
                rules,
            })
            .unwrap();
        self.cluster_role_bindings
            .upsert(ClusterRoleBinding {
                metadata: ObjectMeta::named(format!("{user}-binding")),
                subjects: vec![RbacSubject {
                    kind: "User".to_string(),
                    name: user.to_string(),
                    namespace: None,
                }],
                role_ref: RoleRef {
                    kind: "ClusterRole".to_string(),
                    name: role_name,
                },
            })
            .unwrap();
    }

    /// Binds `template` to `user` on `cluster`.
    pub fn bind_on_cluster(&self, user: &str, template: &str, cluster: &str) {
        self.crtbs
            .upsert(crtb(&format!("{user}-{template}-{cluster}"), user, template, cluster))
            .unwrap();
    }

    /// Binds `role` to `user` globally.
    pub fn bind_global_role(&self, user: &str, role: &str) {
        self.grbs.upsert(grb(&format!("{user}-{role}"), user, role)).unwrap();
    }
}

// ============================================================================
// SECTION: Builders
// ============================================================================

pub fn rule(verbs: &[&str], resources: &[&str]) -> PolicyRule {
    PolicyRule::new().with_verbs(verbs.iter().copied()).with_resources(resources.iter().copied())
}

pub fn template(name: &str, context: TemplateContext, rules: Vec<PolicyRule>) -> RoleTemplate {
    RoleTemplate {
        rules,
        context,
        ..RoleTemplate::named(name)
    }
}

pub fn crtb(name: &str, user: &str, template: &str, cluster: &str) -> ClusterRoleTemplateBinding {
    ClusterRoleTemplateBinding {
        metadata: ObjectMeta::namespaced(cluster, name),
        subject: BindingSubject::user(user),
        role_template_name: template.to_string(),
        cluster_name: cluster.to_string(),
    }
}

pub fn prtb(name: &str, user: &str, template: &str, project: &str) -> ProjectRoleTemplateBinding {
    ProjectRoleTemplateBinding {
        metadata: ObjectMeta::named(name),
        subject: BindingSubject::user(user),
        role_template_name: template.to_string(),
        project_name: project.to_string(),
    }
}

pub fn grb(name: &str, user: &str, role: &str) -> GlobalRoleBinding {
    GlobalRoleBinding {
        metadata: ObjectMeta::named(name),
        subject: BindingSubject::user(user),
        global_role_name: role.to_string(),
    }
}

pub fn user(name: &str) -> UserInfo {
    UserInfo::new(name, Vec::<String>::new())
}

/// Builds a request carrying `object` for a management resource.
pub fn request<T: Serialize>(
    resource: &str,
    operation: Operation,
    requester: &str,
    object: &T,
) -> AdmissionRequest {
    let object = serde_json::to_value(object).unwrap();
    let name = object
        .pointer("/metadata/name")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    let mut request =
        AdmissionRequest::new(format!("uid-{name}"), management_resource(resource), operation, user(requester));
    request.name = name;
    match operation {
        Operation::Delete => request.with_old_object(object),
        _ => request.with_object(object),
    }
}

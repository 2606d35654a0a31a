// grant-gate-core/src/core/model.rs
// ============================================================================
// Module: Grant Gate Object Model
// Description: Typed platform objects consumed by rule resolution.
// Purpose: Model role templates, global roles, bindings, and native RBAC objects.
// Dependencies: crate::core::rules, serde, thiserror
// ============================================================================

//! ## Overview
//! Objects mirror the wire shape of the platform's resources (camelCase JSON)
//! so admission payloads decode directly into them. Every cached object
//! implements [`CacheObject`] to expose its metadata and cache key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::rules::PolicyRule;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// API group of the platform's management resources.
pub const MANAGEMENT_API_GROUP: &str = "management.grant-gate.io";
/// Resource name of the fleet workspace type.
pub const FLEET_WORKSPACES_RESOURCE: &str = "fleetworkspaces";
/// Extra attribute key carrying the requester's principal identifiers.
pub const PRINCIPAL_ID_EXTRA: &str = "principalid";
/// Username prefix of service account identities.
const SERVICE_ACCOUNT_PREFIX: &str = "system:serviceaccount:";

// ============================================================================
// SECTION: Metadata
// ============================================================================

/// Object metadata shared by every platform object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name.
    #[serde(default)]
    pub name: String,
    /// Namespace for namespaced objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Object labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Object annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Creates cluster-scoped metadata.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Creates namespaced metadata.
    #[must_use]
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }

    /// Returns the cache key: `namespace/name` or `name`.
    #[must_use]
    pub fn key(&self) -> String {
        match self.namespace.as_deref() {
            Some(namespace) if !namespace.is_empty() => format!("{namespace}/{}", self.name),
            _ => self.name.clone(),
        }
    }
}

/// Cached object accessors.
pub trait CacheObject: Clone + Send + Sync + 'static {
    /// Kind label used in errors.
    const KIND: &'static str;

    /// Returns the object metadata.
    fn meta(&self) -> &ObjectMeta;

    /// Returns the cache key for this object.
    fn cache_key(&self) -> String {
        self.meta().key()
    }
}

/// Implements [`CacheObject`] for types with a `metadata` field.
macro_rules! cache_object {
    ($ty:ty, $kind:literal) => {
        impl CacheObject for $ty {
            const KIND: &'static str = $kind;

            fn meta(&self) -> &ObjectMeta {
                &self.metadata
            }
        }
    };
}

// ============================================================================
// SECTION: Role Templates
// ============================================================================

/// Scope a role template is meant to be bound at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateContext {
    /// Bound on clusters.
    #[serde(rename = "cluster")]
    Cluster,
    /// Bound on projects.
    #[serde(rename = "project")]
    Project,
    /// No declared context.
    #[default]
    #[serde(rename = "")]
    Unset,
}

impl TemplateContext {
    /// Returns the wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Project => "project",
            Self::Unset => "",
        }
    }
}

/// Named, composable bundle of policy rules.
///
/// # Invariants
/// - The inheritance graph reachable through `role_template_names` is acyclic
///   once admitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleTemplate {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Human readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Inline rules.
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    /// Inherited template names.
    #[serde(default)]
    pub role_template_names: Vec<String>,
    /// Rules are sourced from a backing cluster role or `external_rules`.
    #[serde(default)]
    pub external: bool,
    /// Explicit rules for external templates.
    #[serde(default)]
    pub external_rules: Vec<PolicyRule>,
    /// Declared binding scope.
    #[serde(default)]
    pub context: TemplateContext,
    /// Grants administrative rights on its scope.
    #[serde(default)]
    pub administrative: bool,
    /// Shipped by the platform.
    #[serde(default)]
    pub builtin: bool,
    /// New bindings may not reference it.
    #[serde(default)]
    pub locked: bool,
}

impl RoleTemplate {
    /// Creates an empty template with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            ..Self::default()
        }
    }

    /// Returns the template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

cache_object!(RoleTemplate, "roletemplate");

// ============================================================================
// SECTION: Native RBAC Objects
// ============================================================================

/// Cluster-scoped native role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRole {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Granted rules.
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

cache_object!(ClusterRole, "clusterrole");

/// Namespaced native role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Granted rules.
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

cache_object!(Role, "role");

/// Reference from a native binding to a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRef {
    /// `Role` or `ClusterRole`.
    pub kind: String,
    /// Referenced role name.
    pub name: String,
}

/// Native binding subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RbacSubject {
    /// `User`, `Group`, or `ServiceAccount`.
    pub kind: String,
    /// Subject name.
    pub name: String,
    /// Namespace for service accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl RbacSubject {
    /// Returns the subject key this subject matches, if the kind is known.
    #[must_use]
    pub fn subject_key(&self) -> Option<String> {
        match self.kind.as_str() {
            "User" => Some(user_key(&self.name)),
            "Group" => Some(group_key(&self.name)),
            "ServiceAccount" => {
                let namespace = self.namespace.as_deref().unwrap_or_default();
                Some(user_key(&format!("{SERVICE_ACCOUNT_PREFIX}{namespace}:{}", self.name)))
            }
            _ => None,
        }
    }
}

/// Namespaced native binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleBinding {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Bound subjects.
    #[serde(default)]
    pub subjects: Vec<RbacSubject>,
    /// Bound role.
    pub role_ref: RoleRef,
}

cache_object!(RoleBinding, "rolebinding");

/// Cluster-wide native binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRoleBinding {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Bound subjects.
    #[serde(default)]
    pub subjects: Vec<RbacSubject>,
    /// Bound cluster role.
    pub role_ref: RoleRef,
}

cache_object!(ClusterRoleBinding, "clusterrolebinding");

// ============================================================================
// SECTION: Platform Bindings
// ============================================================================

/// Subject of a platform binding. Exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingSubject {
    /// Platform user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// User principal identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_principal_name: Option<String>,
    /// Group name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    /// Group principal identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_principal_name: Option<String>,
    /// Service account as `namespace:name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
}

/// Binding subject shape errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubjectError {
    /// No subject field is set.
    #[error("binding must name a subject")]
    Missing,
    /// More than one subject field is set.
    #[error("binding must name exactly one subject, found {0}")]
    Ambiguous(usize),
    /// The service account is not `namespace:name`.
    #[error("service account \"{0}\" must be formatted as namespace:name")]
    MalformedServiceAccount(String),
}

impl BindingSubject {
    /// Returns a subject bound to a user name.
    #[must_use]
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            user_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Returns a subject bound to a group principal.
    #[must_use]
    pub fn group_principal(name: impl Into<String>) -> Self {
        Self {
            group_principal_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Returns the subject key of the single populated subject field.
    ///
    /// # Errors
    ///
    /// Returns [`SubjectError`] unless exactly one field is set.
    pub fn subject_key(&self) -> Result<String, SubjectError> {
        let mut keys = Vec::new();
        if let Some(name) = non_empty(self.user_name.as_deref()) {
            keys.push(user_key(name));
        }
        if let Some(name) = non_empty(self.user_principal_name.as_deref()) {
            keys.push(principal_key(name));
        }
        if let Some(name) = non_empty(self.group_name.as_deref()) {
            keys.push(group_key(name));
        }
        if let Some(name) = non_empty(self.group_principal_name.as_deref()) {
            keys.push(group_key(name));
        }
        if let Some(account) = non_empty(self.service_account.as_deref()) {
            let Some((namespace, name)) = account.split_once(':') else {
                return Err(SubjectError::MalformedServiceAccount(account.to_string()));
            };
            if namespace.is_empty() || name.is_empty() {
                return Err(SubjectError::MalformedServiceAccount(account.to_string()));
            }
            keys.push(user_key(&format!("{SERVICE_ACCOUNT_PREFIX}{namespace}:{name}")));
        }
        match keys.len() {
            0 => Err(SubjectError::Missing),
            1 => Ok(keys.remove(0)),
            count => Err(SubjectError::Ambiguous(count)),
        }
    }
}

/// Grants a role template on a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRoleTemplateBinding {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Bound subject.
    #[serde(flatten)]
    pub subject: BindingSubject,
    /// Granted role template.
    #[serde(default)]
    pub role_template_name: String,
    /// Target cluster.
    #[serde(default)]
    pub cluster_name: String,
}

cache_object!(ClusterRoleTemplateBinding, "clusterroletemplatebinding");

/// Grants a role template on a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRoleTemplateBinding {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Bound subject.
    #[serde(flatten)]
    pub subject: BindingSubject,
    /// Granted role template.
    #[serde(default)]
    pub role_template_name: String,
    /// Target project as `cluster:project`.
    #[serde(default)]
    pub project_name: String,
}

cache_object!(ProjectRoleTemplateBinding, "projectroletemplatebinding");

// ============================================================================
// SECTION: Global Roles
// ============================================================================

/// Permissions granted inside fleet workspaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetWorkspacePermission {
    /// Rules applied in every fleet workspace.
    #[serde(default)]
    pub resource_rules: Vec<PolicyRule>,
    /// Verbs granted on the fleet workspace objects themselves.
    #[serde(default)]
    pub workspace_verbs: Vec<String>,
}

/// Platform-wide role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalRole {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Human readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Rules granted on the management cluster.
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    /// Role templates granted on every downstream cluster.
    #[serde(default)]
    pub inherited_cluster_roles: Vec<String>,
    /// Fleet workspace permissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_fleet_workspace_permissions: Option<FleetWorkspacePermission>,
    /// Shipped by the platform.
    #[serde(default)]
    pub builtin: bool,
}

impl GlobalRole {
    /// Creates an empty global role with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            ..Self::default()
        }
    }
}

cache_object!(GlobalRole, "globalrole");

/// Grants a global role to a subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalRoleBinding {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Bound subject.
    #[serde(flatten)]
    pub subject: BindingSubject,
    /// Granted global role.
    #[serde(default)]
    pub global_role_name: String,
}

cache_object!(GlobalRoleBinding, "globalrolebinding");

// ============================================================================
// SECTION: Features
// ============================================================================

/// Feature spec override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Explicit value; `None` defers to the status default.
    #[serde(default)]
    pub value: Option<bool>,
}

/// Feature status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureStatus {
    /// Platform default.
    #[serde(default)]
    pub default: bool,
}

/// Named boolean feature flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Spec override.
    #[serde(default)]
    pub spec: FeatureSpec,
    /// Status default.
    #[serde(default)]
    pub status: FeatureStatus,
}

impl Feature {
    /// Creates a feature with an explicit value.
    #[must_use]
    pub fn with_value(name: impl Into<String>, value: Option<bool>, default: bool) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            spec: FeatureSpec {
                value,
            },
            status: FeatureStatus {
                default,
            },
        }
    }

    /// Returns the effective flag value.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.spec.value.unwrap_or(self.status.default)
    }
}

cache_object!(Feature, "feature");

// ============================================================================
// SECTION: Requester Identity
// ============================================================================

/// Authenticated requester identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Username.
    #[serde(default)]
    pub username: String,
    /// Stable user identifier.
    #[serde(default)]
    pub uid: String,
    /// Group memberships.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Extra attributes.
    #[serde(default)]
    pub extra: BTreeMap<String, Vec<String>>,
}

impl UserInfo {
    /// Creates an identity with a username and groups.
    #[must_use]
    pub fn new<I, S>(username: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            username: username.into(),
            groups: groups.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Returns every subject key this requester matches.
    #[must_use]
    pub fn subject_keys(&self) -> Vec<String> {
        let mut keys = vec![user_key(&self.username)];
        if let Some(principals) = self.extra.get(PRINCIPAL_ID_EXTRA) {
            keys.extend(principals.iter().map(|principal| principal_key(principal)));
        }
        keys.extend(self.groups.iter().map(|group| group_key(group)));
        keys.sort();
        keys.dedup();
        keys
    }
}

// ============================================================================
// SECTION: Subject Keys
// ============================================================================

/// Subject key of a user name.
#[must_use]
pub fn user_key(name: &str) -> String {
    format!("user:{name}")
}

/// Subject key of a user principal.
#[must_use]
pub fn principal_key(name: &str) -> String {
    format!("principal:{name}")
}

/// Subject key of a group name or group principal.
#[must_use]
pub fn group_key(name: &str) -> String {
    format!("group:{name}")
}

/// Index key combining a subject key and a scope key.
///
/// The subject is length-prefixed so a `|` inside either part cannot make two
/// distinct pairs collide.
#[must_use]
pub fn subject_scope_key(subject_key: &str, scope: &str) -> String {
    format!("{}:{subject_key}|{scope}", subject_key.len())
}

/// Returns the value when present and non-empty.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

// grant-gate-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared caches and builders for resolver tests.
// Purpose: Provide reusable in-memory platform state.
// Dependencies: grant-gate-core
// ============================================================================

//! ## Overview
//! [`Fixture`] holds one in-memory cache per object kind. Tests populate the
//! caches and then build resolvers over them.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(clippy::unwrap_used, reason = "Test fixtures are deterministic.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use grant_gate_core::CacheError;
use grant_gate_core::ClusterRole;
use grant_gate_core::ClusterRoleBinding;
use grant_gate_core::ClusterRoleTemplateBinding;
use grant_gate_core::Feature;
use grant_gate_core::GlobalRole;
use grant_gate_core::GlobalRoleBinding;
use grant_gate_core::InMemoryCache;
use grant_gate_core::IndexFn;
use grant_gate_core::LabelSelector;
use grant_gate_core::ObjectCache;
use grant_gate_core::ObjectMeta;
use grant_gate_core::PolicyRule;
use grant_gate_core::ProjectRoleTemplateBinding;
use grant_gate_core::Role;
use grant_gate_core::RoleBinding;
use grant_gate_core::RoleTemplate;
use grant_gate_core::RoleTemplateResolver;

// ============================================================================
// SECTION: Fixture
// ============================================================================

/// In-memory platform state.
#[derive(Default)]
pub struct Fixture {
    pub templates: Arc<InMemoryCache<RoleTemplate>>,
    pub cluster_roles: Arc<CountingCache<ClusterRole>>,
    pub roles: Arc<InMemoryCache<Role>>,
    pub role_bindings: Arc<InMemoryCache<RoleBinding>>,
    pub cluster_role_bindings: Arc<InMemoryCache<ClusterRoleBinding>>,
    pub crtbs: Arc<InMemoryCache<ClusterRoleTemplateBinding>>,
    pub prtbs: Arc<InMemoryCache<ProjectRoleTemplateBinding>>,
    pub global_roles: Arc<InMemoryCache<GlobalRole>>,
    pub grbs: Arc<InMemoryCache<GlobalRoleBinding>>,
    pub features: Arc<InMemoryCache<Feature>>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_template(&self, template: RoleTemplate) {
        self.templates.upsert(template).unwrap();
    }

    pub fn add_cluster_role(&self, name: &str, rules: Vec<PolicyRule>) {
        self.cluster_roles
            .inner
            .upsert(ClusterRole {
                metadata: ObjectMeta::named(name),
                rules,
            })
            .unwrap();
    }

    pub fn set_external_rules(&self, enabled: bool) {
        self.features.upsert(Feature::with_value("external-rules", Some(enabled), false)).unwrap();
    }

    pub fn template_resolver(&self) -> RoleTemplateResolver {
        RoleTemplateResolver::new(
            self.templates.clone(),
            self.cluster_roles.clone(),
            self.features.clone(),
        )
    }
}

// ============================================================================
// SECTION: Builders
// ============================================================================

pub fn rule(verbs: &[&str], resources: &[&str]) -> PolicyRule {
    PolicyRule::new().with_verbs(verbs.iter().copied()).with_resources(resources.iter().copied())
}

pub fn template(name: &str, rules: Vec<PolicyRule>, inherits: &[&str]) -> RoleTemplate {
    let mut template = RoleTemplate::named(name);
    template.rules = rules;
    template.role_template_names = inherits.iter().map(ToString::to_string).collect();
    template
}

// ============================================================================
// SECTION: Counting Cache
// ============================================================================

/// Cache wrapper counting `get` calls.
pub struct CountingCache<T> {
    pub inner: InMemoryCache<T>,
    gets: AtomicUsize,
}

impl<T: grant_gate_core::CacheObject> Default for CountingCache<T> {
    fn default() -> Self {
        Self {
            inner: InMemoryCache::default(),
            gets: AtomicUsize::default(),
        }
    }
}

impl<T> CountingCache<T> {
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

impl<T: grant_gate_core::CacheObject> ObjectCache<T> for CountingCache<T> {
    fn get(&self, key: &str) -> Result<T, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn list(&self, selector: &LabelSelector) -> Result<Vec<T>, CacheError> {
        self.inner.list(selector)
    }

    fn get_by_index(&self, index: &str, key: &str) -> Result<Vec<T>, CacheError> {
        self.inner.get_by_index(index, key)
    }

    fn add_indexer(&self, name: &str, index: IndexFn<T>) -> Result<(), CacheError> {
        self.inner.add_indexer(name, index)
    }
}

/// Cache whose every read fails with a backend error.
pub struct FailingCache;

impl<T> ObjectCache<T> for FailingCache {
    fn get(&self, _key: &str) -> Result<T, CacheError> {
        Err(CacheError::Backend("store offline".to_string()))
    }

    fn list(&self, _selector: &LabelSelector) -> Result<Vec<T>, CacheError> {
        Err(CacheError::Backend("store offline".to_string()))
    }

    fn get_by_index(&self, _index: &str, _key: &str) -> Result<Vec<T>, CacheError> {
        Err(CacheError::Backend("store offline".to_string()))
    }

    fn add_indexer(&self, _name: &str, _index: IndexFn<T>) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Cache serving an in-memory store but failing reads of one key.
pub struct BrokenKeyCache<T> {
    pub inner: Arc<InMemoryCache<T>>,
    pub broken: String,
}

impl<T> BrokenKeyCache<T> {
    pub fn new(inner: Arc<InMemoryCache<T>>, broken: &str) -> Self {
        Self {
            inner,
            broken: broken.to_string(),
        }
    }
}

impl<T: grant_gate_core::CacheObject> ObjectCache<T> for BrokenKeyCache<T> {
    fn get(&self, key: &str) -> Result<T, CacheError> {
        if key == self.broken {
            return Err(CacheError::Backend("store offline".to_string()));
        }
        self.inner.get(key)
    }

    fn list(&self, selector: &LabelSelector) -> Result<Vec<T>, CacheError> {
        self.inner.list(selector)
    }

    fn get_by_index(&self, index: &str, key: &str) -> Result<Vec<T>, CacheError> {
        self.inner.get_by_index(index, key)
    }

    fn add_indexer(&self, name: &str, index: IndexFn<T>) -> Result<(), CacheError> {
        self.inner.add_indexer(name, index)
    }
}

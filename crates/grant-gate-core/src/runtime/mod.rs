// grant-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Grant Gate Runtime
// Description: Caches, rule resolvers, cycle detection, and escalation checks.
// Purpose: Compute effective rules and decide whether a grant escalates.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement rule resolution over the cache interfaces. All
//! resolution is synchronous; only the live escalate-verb check awaits.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod aggregate;
pub mod bindings;
pub mod cache;
pub mod circular;
pub mod escalation;
pub mod global;
pub mod native;
pub mod template;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use aggregate::AggregateRuleResolver;
pub use bindings::BindingRuleResolver;
pub use bindings::CRTB_BY_SUBJECT_SCOPE_INDEX;
pub use bindings::CrtbRuleResolver;
pub use bindings::GRB_BY_SUBJECT_INDEX;
pub use bindings::GrbClusterRuleResolver;
pub use bindings::GrbGlobalRuleResolver;
pub use bindings::PRTB_BY_SUBJECT_SCOPE_INDEX;
pub use bindings::PrtbRuleResolver;
pub use bindings::TemplateBinding;
pub use cache::InMemoryCache;
pub use circular::CircularRefError;
pub use circular::RT_BY_INHERITED_INDEX;
pub use circular::check_circular_ref;
pub use circular::register_inherited_index;
pub use circular::templates_inheriting;
pub use escalation::ESCALATE_VERB;
pub use escalation::EscalateCheck;
pub use escalation::EscalateTarget;
pub use escalation::EscalationError;
pub use escalation::RuleBasedPermissionChecker;
pub use escalation::confirm_no_escalation;
pub use escalation::escalation_authorized;
pub use global::CLUSTER_OWNER_TEMPLATE;
pub use global::GlobalRoleResolver;
pub use global::RESTRICTED_ADMIN_ROLE;
pub use native::NativeRbacResolver;
pub use template::EXTERNAL_RULES_FEATURE;
pub use template::RoleTemplateResolver;

// grant-gate-core/src/lib.rs
// ============================================================================
// Module: Grant Gate Core Library
// Description: Public API surface for the Grant Gate core.
// Purpose: Expose the object model, lookup interfaces, and rule resolution.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Grant Gate core flattens role templates and global roles into policy rules,
//! resolves the rules a requester already holds at a scope, and decides
//! whether a grant would escalate privileges. It reads platform state through
//! explicit cache interfaces and never owns it.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AccessReview;
pub use interfaces::CacheError;
pub use interfaces::IndexFn;
pub use interfaces::LabelSelector;
pub use interfaces::ObjectCache;
pub use interfaces::PermissionCheckError;
pub use interfaces::PermissionChecker;
pub use interfaces::ResolveError;
pub use interfaces::ResolvedRules;
pub use interfaces::RuleResolver;
pub use interfaces::ensure_indexer;
pub use runtime::AggregateRuleResolver;
pub use runtime::CircularRefError;
pub use runtime::CrtbRuleResolver;
pub use runtime::ESCALATE_VERB;
pub use runtime::EscalateCheck;
pub use runtime::EscalateTarget;
pub use runtime::EscalationError;
pub use runtime::GlobalRoleResolver;
pub use runtime::GrbClusterRuleResolver;
pub use runtime::GrbGlobalRuleResolver;
pub use runtime::InMemoryCache;
pub use runtime::NativeRbacResolver;
pub use runtime::PrtbRuleResolver;
pub use runtime::RoleTemplateResolver;
pub use runtime::RuleBasedPermissionChecker;
pub use runtime::check_circular_ref;
pub use runtime::confirm_no_escalation;
pub use runtime::escalation_authorized;

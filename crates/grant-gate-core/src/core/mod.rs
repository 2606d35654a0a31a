// grant-gate-core/src/core/mod.rs
// ============================================================================
// Module: Grant Gate Core Types
// Description: Object model and policy rule primitives.
// Purpose: Group the data types shared by resolvers and admission.
// Dependencies: crate::core::{model, rules}
// ============================================================================

//! ## Overview
//! Core types are plain data: platform objects and the policy rule coverage
//! relation. They carry no cache or I/O dependencies.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod model;
pub mod rules;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use model::*;
pub use rules::CORE_API_GROUP;
pub use rules::PolicyRule;
pub use rules::RuleError;
pub use rules::WILDCARD;
pub use rules::covers;
pub use rules::uncovered_rules;

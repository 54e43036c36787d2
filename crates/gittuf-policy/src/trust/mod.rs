//! Trust: who may sign what, derived from a policy snapshot.
//!
//! The trust module provides:
//! - A per-query trust database of keys and role bindings
//! - Root loading and lazy breadth-first expansion of the delegation graph
//! - Resolution of the role governing a target and of the rule matching a path
//! - Rule authoring on top of an editable policy state

pub mod builder;
pub mod database;
pub mod resolver;
pub mod rules;

pub use builder::{build_top_level, build_until, load_root};
pub use database::TrustDatabase;
pub use resolver::{is_catch_all, resolve_governing_role, resolve_matching_rule, GoverningRole};
pub use rules::{add_rule, record_target};

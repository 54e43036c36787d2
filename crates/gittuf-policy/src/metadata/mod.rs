//! Signed role metadata.
//!
//! Role documents follow the TUF layout: a `root` role binds the top-level
//! keys and roles, `targets` roles record protected targets and delegate
//! path patterns to further roles. Every document travels inside a
//! [`SignedEnvelope`] whose signatures cover the canonical JSON of its
//! `signed` payload.

pub mod builder;
pub mod envelope;
pub mod pattern;
pub mod role;

pub use builder::{RootBuilder, TargetsBuilder};
pub use envelope::{Signature, SignedEnvelope};
pub use pattern::path_matches;
pub use role::{
    DelegatedRole, Delegations, Root, RoleKeys, TargetFile, Targets, HASH_ALGORITHM, ROOT_ROLE,
    TARGETS_ROLE,
};

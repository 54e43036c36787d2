//! gittuf-policy: verifiable authorization policy for version-controlled content.
//!
//! Provides a content-addressed policy namespace of signed role metadata
//! and keys, breadth-first delegation resolution, transition verification
//! for protected references, and a signed per-reference checkpoint log.

pub mod config;
pub mod crypto;
pub mod error;
pub mod metadata;
pub mod policy;
pub mod store;
pub mod time;
pub mod trust;
pub mod verify;

// Re-export primary types
pub use config::{ThresholdMode, VerifierConfig, ALLOW_RULE};
pub use error::{PolicyError, Result};
pub use policy::{
    LastTrustedIndex, PolicySnapshot, PolicyState, ReferenceStateEntry, ReferenceStateLog,
    LAST_TRUSTED_REF, POLICY_STATE_REF, REFERENCE_STATE_REF,
};
pub use store::{MemoryStore, ObjectId, ObjectStore};

// Re-export metadata types
pub use crypto::{Ed25519KeyPair, PublicKey};
pub use metadata::{
    DelegatedRole, Root, RootBuilder, SignedEnvelope, TargetFile, Targets, TargetsBuilder,
};

// Re-export verification entry points
pub use trust::{
    build_top_level, build_until, resolve_governing_role, resolve_matching_rule, GoverningRole,
    TrustDatabase,
};
pub use verify::{verify_current_state, verify_transition, Target, TransitionVerification};

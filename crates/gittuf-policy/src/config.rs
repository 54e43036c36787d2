//! Verifier configuration.
//!
//! Behavioural knobs only. The persisted namespace layout (ref names,
//! directory names) is fixed in [`crate::policy`] so that every
//! implementation reads the same store.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};

/// Name of the reserved catch-all rule.
pub const ALLOW_RULE: &str = "allow-*";

/// How a rule's signing threshold is applied to the signers of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Every signer must be an allowed key; the count is ignored.
    MembershipOnly,
    /// Every signer must be an allowed key, and at least `threshold`
    /// distinct allowed keys must have signed.
    Enforce,
}

/// Configuration for delegation walks and change verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub threshold_mode: ThresholdMode,
    /// Upper bound on roles visited by a single delegation walk.
    pub max_roles_visited: usize,
    pub catch_all_rule: String,
    /// Reject role metadata whose `expires` is in the past.
    pub check_expiry: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            threshold_mode: ThresholdMode::Enforce,
            max_roles_visited: 1024,
            catch_all_rule: ALLOW_RULE.to_string(),
            check_expiry: true,
        }
    }
}

impl VerifierConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        serde_json::from_slice(&bytes).map_err(|e| {
            PolicyError::Decode(format!(
                "invalid verifier config {}: {e}",
                path.as_ref().display()
            ))
        })
    }

    /// The literal membership-only behaviour.
    pub fn membership_only() -> Self {
        Self {
            threshold_mode: ThresholdMode::MembershipOnly,
            ..Self::default()
        }
    }
}

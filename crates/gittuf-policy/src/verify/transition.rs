//! Transition verification: may a target move from one policy state to
//! another?
//!
//! The protected content recorded for the target in each state is
//! diffed. Every changed path must be covered by the rule the *older*
//! policy applies to it, and the keys that signed the role recording the
//! target in the *newer* policy must be allowed by that rule. Renames are
//! checked under both names.

use std::collections::BTreeSet;

use super::current::recorded_tip;
use super::target::Target;
use crate::config::{ThresholdMode, VerifierConfig};
use crate::error::{PolicyError, Result};
use crate::policy::{PolicySnapshot, PolicyState};
use crate::store::{Change, ObjectId, ObjectStore};
use crate::trust::{is_catch_all, resolve_governing_role, resolve_matching_rule};

/// Result of a successful transition check.
#[derive(Debug, Clone)]
pub struct TransitionVerification {
    pub target: String,
    pub from_state: ObjectId,
    pub to_state: ObjectId,
    /// Role recording the target in the newer state; `None` when the two
    /// states are the same.
    pub governing_role: Option<String>,
    /// Keys that signed the governing role.
    pub signers: BTreeSet<String>,
    /// Paths changed between the recorded tips.
    pub changes: Vec<Change>,
    /// Verification timestamp.
    pub verified_at: u64,
}

/// Verify that `target` may move from policy state `from_state` to
/// `to_state`. Both must be on the linear history of the policy reference.
///
/// Fails with [`PolicyError::UnauthorizedChange`] naming the first path
/// whose change the older policy does not allow.
pub fn verify_transition(
    store: &dyn ObjectStore,
    target: &str,
    from_state: &ObjectId,
    to_state: &ObjectId,
    config: &VerifierConfig,
) -> Result<TransitionVerification> {
    let mut verification = TransitionVerification {
        target: target.to_string(),
        from_state: *from_state,
        to_state: *to_state,
        governing_role: None,
        signers: BTreeSet::new(),
        changes: Vec::new(),
        verified_at: crate::time::now_micros(),
    };
    if from_state == to_state {
        return Ok(verification);
    }
    target.parse::<Target>()?;

    let old = PolicyState::load_at(store, from_state)?.snapshot();
    let new = PolicyState::load_at(store, to_state)?.snapshot();

    let old_governing = resolve_governing_role(store, &old, target, config)?;
    let old_tree = store
        .read_commit(&recorded_tip(&old_governing.targets, target)?)?
        .tree;

    let new_governing = resolve_governing_role(store, &new, target, config)?;
    let new_tree = store
        .read_commit(&recorded_tip(&new_governing.targets, target)?)?
        .tree;

    let changes = store.diff_trees(&old_tree, &new_tree)?;
    let signers = new_governing.signers;
    log::debug!(
        "{target}: {} changed path(s), role {} signed by {:?}",
        changes.len(),
        new_governing.name,
        signers
    );

    for change in &changes {
        if let Some(from) = change.from.as_deref() {
            check_path(store, &old, from, &signers, config)?;
        }
        if let Some(to) = change.to.as_deref() {
            if change.from.as_deref() != Some(to) {
                check_path(store, &old, to, &signers, config)?;
            }
        }
    }

    log::info!("{target}: transition {from_state} -> {to_state} verified");
    verification.governing_role = Some(new_governing.name);
    verification.signers = signers;
    verification.changes = changes;
    Ok(verification)
}

fn check_path(
    store: &dyn ObjectStore,
    policy: &PolicySnapshot,
    path: &str,
    signers: &BTreeSet<String>,
    config: &VerifierConfig,
) -> Result<()> {
    let rule = resolve_matching_rule(store, policy, path, config)?;
    if is_catch_all(&rule, config) {
        return Ok(());
    }

    let members = signers.iter().all(|id| rule.keyids.contains(id));
    let threshold_met = match config.threshold_mode {
        ThresholdMode::MembershipOnly => true,
        ThresholdMode::Enforce => signers.len() >= rule.threshold as usize,
    };
    if members && threshold_met {
        return Ok(());
    }

    log::warn!(
        "change to {path} not allowed by rule {} ({} signer(s), threshold {})",
        rule.name,
        signers.len(),
        rule.threshold
    );
    Err(PolicyError::UnauthorizedChange {
        path: path.to_string(),
    })
}

//! Authoring targets roles: adding rules and recording targets.
//!
//! Both operations rewrite one role document, re-sign it with the given
//! keys and commit it to the policy state. A role with no metadata yet
//! starts from an empty document.

use crate::crypto::{Ed25519KeyPair, PublicKey};
use crate::error::Result;
use crate::metadata::{DelegatedRole, TargetFile, Targets, TargetsBuilder};
use crate::policy::PolicyState;
use crate::store::{ObjectId, ObjectStore};

fn current_targets(store: &dyn ObjectStore, state: &PolicyState, role: &str) -> Result<TargetsBuilder> {
    let snapshot = state.snapshot();
    if !snapshot.has_role(role) {
        return Ok(TargetsBuilder::new());
    }
    let targets: Targets = snapshot.envelope(store, role)?.payload()?;
    Ok(TargetsBuilder::from_targets(targets))
}

/// Delegate `rule` from `role`, allowing `rule_keys` to sign for it.
///
/// A rule with the same name replaces the earlier one in place; new rules
/// are appended and so evaluated after existing ones.
pub fn add_rule(
    store: &dyn ObjectStore,
    state: &mut PolicyState,
    role: &str,
    signers: &[&Ed25519KeyPair],
    rule: DelegatedRole,
    rule_keys: &[PublicKey],
) -> Result<()> {
    let rule_name = rule.name.clone();
    let envelope = current_targets(store, state, role)?
        .delegate(rule, rule_keys)?
        .sign(signers)?;
    state.stage_metadata_and_commit(store, role, envelope.to_bytes()?)?;
    log::info!("role {role} now delegates rule {rule_name}");
    Ok(())
}

/// Record `commit_id` as the content of `target` in `role`.
pub fn record_target(
    store: &dyn ObjectStore,
    state: &mut PolicyState,
    role: &str,
    target: &str,
    commit_id: &ObjectId,
    signers: &[&Ed25519KeyPair],
) -> Result<()> {
    let envelope = current_targets(store, state, role)?
        .target(target, TargetFile::for_commit(commit_id))
        .sign(signers)?;
    state.stage_metadata_and_commit(store, role, envelope.to_bytes()?)?;
    log::info!("role {role} records {target} at {commit_id}");
    Ok(())
}

//! Current-state verification.

use super::target::Target;
use crate::config::VerifierConfig;
use crate::error::{PolicyError, Result};
use crate::metadata::Targets;
use crate::policy::{LastTrustedIndex, PolicySnapshot, PolicyState};
use crate::store::{ObjectId, ObjectStore};
use crate::trust::resolve_governing_role;

/// Check that the live tip of `target` is the tip recorded for it by the
/// current policy and by the last-trusted policy.
pub fn verify_current_state(
    store: &dyn ObjectStore,
    target: &str,
    config: &VerifierConfig,
) -> Result<()> {
    let reference: Target = target.parse()?;
    let actual = store.get_ref(reference.ref_name())?;

    let current = PolicyState::load(store)?.snapshot();
    check_recorded(store, &current, target, &actual, config)?;

    let trusted_state = LastTrustedIndex::load(store)?.last_trusted(target)?;
    let trusted = PolicySnapshot::at_commit(store, &trusted_state)?;
    check_recorded(store, &trusted, target, &actual, config)?;

    log::info!("{target} at {actual} matches current and last-trusted policy");
    Ok(())
}

fn check_recorded(
    store: &dyn ObjectStore,
    snapshot: &PolicySnapshot,
    target: &str,
    actual: &ObjectId,
    config: &VerifierConfig,
) -> Result<()> {
    let governing = resolve_governing_role(store, snapshot, target, config)?;
    let recorded = recorded_tip(&governing.targets, target)?;
    if recorded != *actual {
        log::warn!(
            "role {} records {target} at {recorded}, reference is at {actual}",
            governing.name
        );
        return Err(PolicyError::Drift {
            role: governing.name,
            recorded: recorded.to_hex(),
            actual: actual.to_hex(),
        });
    }
    Ok(())
}

/// Commit id a targets document records for `target`.
pub(crate) fn recorded_tip(targets: &Targets, target: &str) -> Result<ObjectId> {
    targets
        .targets
        .get(target)
        .ok_or_else(|| PolicyError::NotFound(format!("recorded hash for {target}")))?
        .commit_id()
}

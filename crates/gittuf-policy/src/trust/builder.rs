//! Building trust databases from a policy snapshot.
//!
//! Root is trusted through its own keys; every targets role is checked
//! against the database that discovered it before its delegations are
//! registered.

use std::collections::{BTreeSet, HashSet, VecDeque};

use chrono::{DateTime, Utc};

use super::database::TrustDatabase;
use crate::config::VerifierConfig;
use crate::error::{PolicyError, Result};
use crate::metadata::{Root, Targets, ROOT_ROLE, TARGETS_ROLE};
use crate::policy::{PolicySnapshot, POLICY_STATE_REF};
use crate::store::ObjectStore;

/// Load and check the root role: present, decodable, self-consistent and
/// signed by a threshold of its own root keys.
pub fn load_root(
    store: &dyn ObjectStore,
    snapshot: &PolicySnapshot,
    config: &VerifierConfig,
) -> Result<Root> {
    let envelope = match snapshot.envelope(store, ROOT_ROLE) {
        Ok(envelope) => envelope,
        Err(PolicyError::RoleNotFound(_)) => {
            return Err(PolicyError::MalformedRoot("root role is absent".into()))
        }
        Err(PolicyError::Decode(reason)) => return Err(PolicyError::MalformedRoot(reason)),
        Err(e) => return Err(e),
    };
    let root: Root = envelope
        .payload()
        .map_err(|e| PolicyError::MalformedRoot(e.to_string()))?;
    root.validate()?;

    let db = TrustDatabase::from_root(&root)
        .map_err(|e| PolicyError::MalformedRoot(e.to_string()))?;
    db.verify_envelope(ROOT_ROLE, &envelope)
        .map_err(|e| PolicyError::MalformedRoot(format!("root is not self-signed: {e}")))?;
    check_expiry(store, snapshot, ROOT_ROLE, &root.expires, config)?;
    Ok(root)
}

/// Database holding every root key and top-level role binding.
pub fn build_top_level(
    store: &dyn ObjectStore,
    snapshot: &PolicySnapshot,
    config: &VerifierConfig,
) -> Result<TrustDatabase> {
    let root = load_root(store, snapshot, config)?;
    TrustDatabase::from_root(&root)
}

/// Expand the top-level database breadth-first from `targets` until
/// `role` is bound.
pub fn build_until(
    store: &dyn ObjectStore,
    snapshot: &PolicySnapshot,
    role: &str,
    config: &VerifierConfig,
) -> Result<TrustDatabase> {
    let mut db = build_top_level(store, snapshot, config)?;
    if db.has_role(role) {
        return Ok(db);
    }

    let mut queue = VecDeque::from([TARGETS_ROLE.to_string()]);
    let mut visited = HashSet::new();
    while let Some(current) = queue.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }
        if visited.len() > config.max_roles_visited {
            log::warn!("stopped looking for {role} after {} roles", config.max_roles_visited);
            break;
        }
        if !snapshot.has_role(&current) {
            log::debug!("role {current} has no metadata, skipping");
            continue;
        }

        let (targets, _) = load_targets(store, snapshot, &current, &db, config)?;
        let Some(delegations) = &targets.delegations else {
            continue;
        };
        for (id, key) in &delegations.keys {
            db.add_key(id, key.clone())?;
        }
        for rule in &delegations.roles {
            db.add_role(&rule.name, rule.role_keys())?;
            if rule.name == role {
                log::debug!("found {role} delegated by {current}");
                return Ok(db);
            }
            queue.push_back(rule.name.clone());
        }
    }

    Err(PolicyError::RoleNotFound(role.to_string()))
}

/// Load a targets role and check its signatures against `db`. Returns the
/// document and the ids of the keys that signed it.
pub(crate) fn load_targets(
    store: &dyn ObjectStore,
    snapshot: &PolicySnapshot,
    role: &str,
    db: &TrustDatabase,
    config: &VerifierConfig,
) -> Result<(Targets, BTreeSet<String>)> {
    let envelope = snapshot.envelope(store, role)?;
    let signers = db.verify_envelope(role, &envelope)?;
    let targets: Targets = envelope.payload()?;
    check_expiry(store, snapshot, role, &targets.expires, config)?;
    targets.validate(role)?;
    log::debug!("loaded role {role} signed by {} key(s)", signers.len());
    Ok((targets, signers))
}

/// Expiry binds only the policy at the tip of the policy reference.
/// Historical states stay verifiable after their metadata expires.
fn check_expiry(
    store: &dyn ObjectStore,
    snapshot: &PolicySnapshot,
    role: &str,
    expires: &DateTime<Utc>,
    config: &VerifierConfig,
) -> Result<()> {
    if !config.check_expiry || *expires >= Utc::now() {
        return Ok(());
    }
    if store.get_ref(POLICY_STATE_REF)? != snapshot.tip() {
        log::debug!(
            "role {role} expired at {expires}, accepted in historical state {}",
            snapshot.tip()
        );
        return Ok(());
    }
    Err(PolicyError::MetadataExpired {
        role: role.to_string(),
        expires: expires.to_rfc3339(),
    })
}

//! Trust database: keys and role bindings discovered during one query.

use std::collections::{BTreeMap, BTreeSet};

use crate::crypto::PublicKey;
use crate::error::{PolicyError, Result};
use crate::metadata::{Delegations, RoleKeys, Root, SignedEnvelope};

/// Keys and role bindings accumulated while walking the delegation graph.
///
/// The database only grows. The first binding registered for a role name
/// wins; later bindings under the same name are ignored.
#[derive(Debug, Clone, Default)]
pub struct TrustDatabase {
    keys: BTreeMap<String, PublicKey>,
    roles: BTreeMap<String, RoleKeys>,
}

impl TrustDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Database of every key and top-level binding in a root document.
    pub fn from_root(root: &Root) -> Result<Self> {
        let mut db = Self::new();
        for (id, key) in &root.keys {
            db.add_key(id, key.clone())?;
        }
        for (name, role) in &root.roles {
            db.add_role(name, role.clone())?;
        }
        Ok(db)
    }

    /// Database scoped to one role's delegations.
    pub fn from_delegations(delegations: &Delegations) -> Result<Self> {
        let mut db = Self::new();
        db.extend_with_delegations(delegations)?;
        Ok(db)
    }

    /// Register the keys and rules a role delegates to.
    pub fn extend_with_delegations(&mut self, delegations: &Delegations) -> Result<()> {
        for (id, key) in &delegations.keys {
            self.add_key(id, key.clone())?;
        }
        for rule in &delegations.roles {
            self.add_role(&rule.name, rule.role_keys())?;
        }
        Ok(())
    }

    /// Register a key under `id`, which must be the key's own id.
    pub fn add_key(&mut self, id: &str, key: PublicKey) -> Result<()> {
        let actual = key.key_id()?;
        if actual != id {
            return Err(PolicyError::InvalidKey(format!(
                "key listed as {id} has id {actual}"
            )));
        }
        self.keys.entry(actual).or_insert(key);
        Ok(())
    }

    pub fn add_role(&mut self, name: &str, role: RoleKeys) -> Result<()> {
        if role.threshold == 0 {
            return Err(PolicyError::Decode(format!("role {name} has threshold 0")));
        }
        if self.roles.contains_key(name) {
            log::debug!("role {name} already bound, keeping first binding");
            return Ok(());
        }
        self.roles.insert(name.to_string(), role);
        Ok(())
    }

    pub fn key(&self, id: &str) -> Option<&PublicKey> {
        self.keys.get(id)
    }

    pub fn role(&self, name: &str) -> Option<&RoleKeys> {
        self.roles.get(name)
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    pub fn keys(&self) -> &BTreeMap<String, PublicKey> {
        &self.keys
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles.keys().cloned().collect()
    }

    /// Check an envelope against the keys bound to `role` and return the
    /// ids of the keys whose signatures verified.
    pub fn verify_envelope(&self, role: &str, envelope: &SignedEnvelope) -> Result<BTreeSet<String>> {
        let binding = self
            .role(role)
            .ok_or_else(|| PolicyError::RoleNotFound(role.to_string()))?;
        let verified = envelope.verified_key_ids(&self.keys, &binding.keyids)?;
        if verified.len() < binding.threshold as usize {
            log::warn!(
                "role {role}: {} of {} required signatures verified",
                verified.len(),
                binding.threshold
            );
            return Err(PolicyError::ThresholdNotMet {
                role: role.to_string(),
                required: binding.threshold,
                valid: verified.len(),
            });
        }
        Ok(verified)
    }
}

//! Builders for signed root and targets metadata.

use chrono::{DateTime, Utc};

use super::envelope::SignedEnvelope;
use super::role::{DelegatedRole, Delegations, Root, RoleKeys, TargetFile, Targets, ROOT_ROLE, TARGETS_ROLE};
use crate::crypto::{Ed25519KeyPair, PublicKey};
use crate::error::Result;

/// Builder for signed root metadata.
pub struct RootBuilder {
    root: Root,
    root_keys: Vec<PublicKey>,
    targets_keys: Vec<PublicKey>,
    root_threshold: u32,
    targets_threshold: u32,
}

impl Default for RootBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RootBuilder {
    pub fn new() -> Self {
        Self {
            root: Root::new(crate::time::default_expiry()),
            root_keys: Vec::new(),
            targets_keys: Vec::new(),
            root_threshold: 1,
            targets_threshold: 1,
        }
    }

    pub fn version(mut self, version: u64) -> Self {
        self.root.version = version;
        self
    }

    pub fn expires(mut self, expires: DateTime<Utc>) -> Self {
        self.root.expires = expires;
        self
    }

    /// Add a key allowed to sign root metadata.
    pub fn root_key(mut self, key: PublicKey) -> Self {
        self.root_keys.push(key);
        self
    }

    /// Add a key allowed to sign top-level targets metadata.
    pub fn targets_key(mut self, key: PublicKey) -> Self {
        self.targets_keys.push(key);
        self
    }

    pub fn root_threshold(mut self, threshold: u32) -> Self {
        self.root_threshold = threshold;
        self
    }

    pub fn targets_threshold(mut self, threshold: u32) -> Self {
        self.targets_threshold = threshold;
        self
    }

    /// The unsigned document.
    pub fn build(mut self) -> Result<Root> {
        let root_ids = register(&mut self.root, &self.root_keys)?;
        let targets_ids = register(&mut self.root, &self.targets_keys)?;
        self.root.roles.insert(
            ROOT_ROLE.to_string(),
            RoleKeys {
                keyids: root_ids,
                threshold: self.root_threshold,
            },
        );
        self.root.roles.insert(
            TARGETS_ROLE.to_string(),
            RoleKeys {
                keyids: targets_ids,
                threshold: self.targets_threshold,
            },
        );
        Ok(self.root)
    }

    pub fn sign(self, keys: &[&Ed25519KeyPair]) -> Result<SignedEnvelope> {
        SignedEnvelope::sign(&self.build()?, keys)
    }
}

fn register(root: &mut Root, keys: &[PublicKey]) -> Result<Vec<String>> {
    let mut ids = Vec::with_capacity(keys.len());
    for key in keys {
        let id = key.key_id()?;
        root.keys.insert(id.clone(), key.clone());
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Builder for signed targets metadata.
pub struct TargetsBuilder {
    targets: Targets,
}

impl Default for TargetsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetsBuilder {
    pub fn new() -> Self {
        Self {
            targets: Targets::new(crate::time::default_expiry()),
        }
    }

    /// Start from an existing document; the version is bumped and the
    /// expiry renewed.
    pub fn from_targets(mut targets: Targets) -> Self {
        targets.version += 1;
        targets.expires = crate::time::default_expiry();
        Self { targets }
    }

    pub fn version(mut self, version: u64) -> Self {
        self.targets.version = version;
        self
    }

    pub fn expires(mut self, expires: DateTime<Utc>) -> Self {
        self.targets.expires = expires;
        self
    }

    /// Record (or replace) a target.
    pub fn target(mut self, name: impl Into<String>, file: TargetFile) -> Self {
        self.targets.targets.insert(name.into(), file);
        self
    }

    pub fn remove_target(mut self, name: &str) -> Self {
        self.targets.targets.remove(name);
        self
    }

    /// Append a delegated rule and register its keys. Rules keep their
    /// insertion order; a rule with the same name is replaced in place.
    pub fn delegate(mut self, rule: DelegatedRole, keys: &[PublicKey]) -> Result<Self> {
        let delegations = self.targets.delegations.get_or_insert_with(Delegations::default);
        for key in keys {
            delegations.keys.insert(key.key_id()?, key.clone());
        }
        match delegations.roles.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule,
            None => delegations.roles.push(rule),
        }
        Ok(self)
    }

    pub fn build(self) -> Targets {
        self.targets
    }

    pub fn sign(self, keys: &[&Ed25519KeyPair]) -> Result<SignedEnvelope> {
        SignedEnvelope::sign(&self.targets, keys)
    }
}

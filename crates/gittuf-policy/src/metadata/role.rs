//! Role documents: root and targets.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pattern::path_matches;
use crate::crypto::PublicKey;
use crate::error::{PolicyError, Result};
use crate::store::ObjectId;

pub const ROOT_ROLE: &str = "root";
pub const TARGETS_ROLE: &str = "targets";

/// Hash algorithm under which target content ids are recorded.
pub const HASH_ALGORITHM: &str = "sha256";

const SPEC_VERSION: &str = "1.0";

fn spec_version() -> String {
    SPEC_VERSION.to_string()
}

/// Keys and threshold bound to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleKeys {
    pub keyids: Vec<String>,
    pub threshold: u32,
}

/// The root role: top-level keys and role bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Root {
    #[serde(rename = "_type")]
    pub kind: String,
    #[serde(default = "spec_version")]
    pub spec_version: String,
    pub version: u64,
    pub expires: DateTime<Utc>,
    pub keys: BTreeMap<String, PublicKey>,
    pub roles: BTreeMap<String, RoleKeys>,
}

impl Root {
    pub fn new(expires: DateTime<Utc>) -> Self {
        Self {
            kind: ROOT_ROLE.to_string(),
            spec_version: spec_version(),
            version: 1,
            expires,
            keys: BTreeMap::new(),
            roles: BTreeMap::new(),
        }
    }

    /// Check internal consistency: type tag, `root` and `targets` bindings,
    /// thresholds, and that every bound key id names a key whose id matches.
    pub fn validate(&self) -> Result<()> {
        if self.kind != ROOT_ROLE {
            return Err(PolicyError::MalformedRoot(format!(
                "unexpected type {:?}",
                self.kind
            )));
        }
        for required in [ROOT_ROLE, TARGETS_ROLE] {
            if !self.roles.contains_key(required) {
                return Err(PolicyError::MalformedRoot(format!(
                    "missing role binding for {required}"
                )));
            }
        }
        for (id, key) in &self.keys {
            if key.key_id()? != *id {
                return Err(PolicyError::MalformedRoot(format!(
                    "key listed as {id} does not hash to its id"
                )));
            }
        }
        for (name, role) in &self.roles {
            if role.threshold == 0 {
                return Err(PolicyError::MalformedRoot(format!(
                    "role {name} has threshold 0"
                )));
            }
            if let Some(missing) = role.keyids.iter().find(|id| !self.keys.contains_key(*id)) {
                return Err(PolicyError::MalformedRoot(format!(
                    "role {name} names unknown key {missing}"
                )));
            }
            let distinct: BTreeSet<&String> = role.keyids.iter().collect();
            if distinct.len() < role.threshold as usize {
                return Err(PolicyError::MalformedRoot(format!(
                    "role {name} has threshold {} but only {} keys",
                    role.threshold,
                    distinct.len()
                )));
            }
        }
        Ok(())
    }
}

/// A recorded target: its length and content hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFile {
    pub length: u64,
    pub hashes: BTreeMap<String, String>,
}

impl TargetFile {
    /// Record a commit id as a target's content.
    pub fn for_commit(id: &ObjectId) -> Self {
        let mut hashes = BTreeMap::new();
        hashes.insert(HASH_ALGORITHM.to_string(), id.to_hex());
        Self { length: 0, hashes }
    }

    /// The recorded commit id, if present and well formed.
    pub fn commit_id(&self) -> Result<ObjectId> {
        self.hashes
            .get(HASH_ALGORITHM)
            .ok_or_else(|| PolicyError::Decode(format!("target has no {HASH_ALGORITHM} hash")))?
            .parse()
    }
}

/// A delegated rule: which keys may sign for which path patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatedRole {
    pub name: String,
    pub keyids: Vec<String>,
    pub threshold: u32,
    #[serde(default)]
    pub terminating: bool,
    pub paths: Vec<String>,
}

impl DelegatedRole {
    pub fn new(
        name: impl Into<String>,
        paths: Vec<String>,
        keyids: Vec<String>,
        threshold: u32,
    ) -> Self {
        Self {
            name: name.into(),
            keyids,
            threshold,
            terminating: false,
            paths,
        }
    }

    pub fn terminating(mut self, terminating: bool) -> Self {
        self.terminating = terminating;
        self
    }

    pub fn matches_path(&self, path: &str) -> bool {
        self.paths.iter().any(|pattern| path_matches(pattern, path))
    }

    pub fn role_keys(&self) -> RoleKeys {
        RoleKeys {
            keyids: self.keyids.clone(),
            threshold: self.threshold,
        }
    }
}

/// Keys and ordered rules a targets role delegates to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delegations {
    pub keys: BTreeMap<String, PublicKey>,
    pub roles: Vec<DelegatedRole>,
}

/// A targets role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    #[serde(rename = "_type")]
    pub kind: String,
    #[serde(default = "spec_version")]
    pub spec_version: String,
    pub version: u64,
    pub expires: DateTime<Utc>,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegations: Option<Delegations>,
}

impl Targets {
    pub fn new(expires: DateTime<Utc>) -> Self {
        Self {
            kind: TARGETS_ROLE.to_string(),
            spec_version: spec_version(),
            version: 1,
            expires,
            targets: BTreeMap::new(),
            delegations: None,
        }
    }

    pub fn contains(&self, target: &str) -> bool {
        self.targets.contains_key(target)
    }

    /// Delegated rules in declared order (empty without delegations).
    pub fn delegated_roles(&self) -> &[DelegatedRole] {
        self.delegations
            .as_ref()
            .map(|d| d.roles.as_slice())
            .unwrap_or_default()
    }

    pub fn validate(&self, role: &str) -> Result<()> {
        if self.kind != TARGETS_ROLE {
            return Err(PolicyError::Decode(format!(
                "role {role} has type {:?}, expected {TARGETS_ROLE}",
                self.kind
            )));
        }
        Ok(())
    }
}

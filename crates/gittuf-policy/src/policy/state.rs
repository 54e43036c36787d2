//! Policy state: immutable snapshots plus a staging area.
//!
//! A [`PolicySnapshot`] is the view of one policy commit. It is never
//! mutated; [`PolicyState::commit`] builds a fresh snapshot from the old
//! entries and the staged content, and swaps it in. Holders of the old
//! snapshot keep seeing the old state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::{
    name_without_extension, KEYS_DIR, KEY_EXTENSION, METADATA_DIR, METADATA_EXTENSION,
    POLICY_STATE_REF,
};
use crate::crypto::PublicKey;
use crate::error::{PolicyError, Result};
use crate::metadata::SignedEnvelope;
use crate::store::{ObjectId, ObjectStore, Tree, TreeEntry};

/// Point-in-time view of the policy namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySnapshot {
    tip: ObjectId,
    tree: ObjectId,
    /// Role name (no extension) to its `metadata/` entry.
    metadata: BTreeMap<String, TreeEntry>,
    /// Key id to its `keys/` entry.
    keys: BTreeMap<String, TreeEntry>,
}

impl PolicySnapshot {
    /// Read the snapshot of an arbitrary policy commit, without checking
    /// that it belongs to the current history.
    pub fn at_commit(store: &dyn ObjectStore, commit_id: &ObjectId) -> Result<Self> {
        let commit = store.read_commit(commit_id)?;
        let tree = store.read_tree(&commit.tree)?;

        let metadata = Self::read_namespace(store, &tree, METADATA_DIR, commit_id)?;
        let keys = Self::read_namespace(store, &tree, KEYS_DIR, commit_id)?;

        Ok(Self {
            tip: *commit_id,
            tree: commit.tree,
            metadata,
            keys,
        })
    }

    /// Every role's metadata bytes at an arbitrary policy commit.
    pub fn metadata_at(
        store: &dyn ObjectStore,
        commit_id: &ObjectId,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        Self::at_commit(store, commit_id)?.all_metadata(store)
    }

    fn read_namespace(
        store: &dyn ObjectStore,
        root: &Tree,
        namespace: &str,
        commit_id: &ObjectId,
    ) -> Result<BTreeMap<String, TreeEntry>> {
        let entry = root
            .entry(namespace)
            .filter(|e| e.is_directory())
            .ok_or_else(|| {
                PolicyError::Store(format!(
                    "policy commit {commit_id} has no {namespace} namespace"
                ))
            })?;
        Ok(store
            .read_tree(&entry.id)?
            .entries
            .into_iter()
            .map(|e| (name_without_extension(&e.name).to_string(), e))
            .collect())
    }

    /// Commit this snapshot was loaded from; zero when no policy exists.
    pub fn tip(&self) -> ObjectId {
        self.tip
    }

    pub fn tree(&self) -> ObjectId {
        self.tree
    }

    pub fn is_empty(&self) -> bool {
        self.tip.is_zero()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.metadata.contains_key(role)
    }

    pub fn role_names(&self) -> Vec<String> {
        self.metadata.keys().cloned().collect()
    }

    pub fn key_ids(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }

    /// Raw metadata bytes of a role.
    pub fn metadata_bytes(&self, store: &dyn ObjectStore, role: &str) -> Result<Vec<u8>> {
        let entry = self
            .metadata
            .get(role)
            .ok_or_else(|| PolicyError::RoleNotFound(role.to_string()))?;
        store.read_blob(&entry.id)
    }

    /// A role's signed envelope.
    pub fn envelope(&self, store: &dyn ObjectStore, role: &str) -> Result<SignedEnvelope> {
        SignedEnvelope::from_bytes(&self.metadata_bytes(store, role)?)
    }

    /// Key ids named by a role's signatures. Signatures are not checked.
    pub fn unverified_signers(&self, store: &dyn ObjectStore, role: &str) -> Result<Vec<String>> {
        Ok(self.envelope(store, role)?.unverified_key_ids())
    }

    /// Every role's metadata bytes.
    pub fn all_metadata(&self, store: &dyn ObjectStore) -> Result<BTreeMap<String, Vec<u8>>> {
        self.metadata
            .iter()
            .map(|(role, entry)| Ok((role.clone(), store.read_blob(&entry.id)?)))
            .collect()
    }

    pub fn root_key(&self, store: &dyn ObjectStore, key_id: &str) -> Result<PublicKey> {
        let entry = self
            .keys
            .get(key_id)
            .ok_or_else(|| PolicyError::NotFound(format!("root key {key_id}")))?;
        Self::decode_key(store, entry)
    }

    pub fn all_root_keys(&self, store: &dyn ObjectStore) -> Result<BTreeMap<String, PublicKey>> {
        self.keys
            .iter()
            .map(|(id, entry)| Ok((id.clone(), Self::decode_key(store, entry)?)))
            .collect()
    }

    fn decode_key(store: &dyn ObjectStore, entry: &TreeEntry) -> Result<PublicKey> {
        let bytes = store.read_blob(&entry.id)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| PolicyError::Decode(format!("malformed key {}: {e}", entry.name)))
    }

    /// Listing of the `metadata` or `keys` namespace as committed.
    pub fn namespace_tree(&self, store: &dyn ObjectStore, namespace: &str) -> Result<Tree> {
        let root = store.read_tree(&self.tree)?;
        let entry = root
            .entry(namespace)
            .ok_or_else(|| PolicyError::NotFound(format!("tree for namespace {namespace}")))?;
        store.read_tree(&entry.id)
    }
}

/// Content staged on top of a snapshot, not yet committed.
#[derive(Debug, Clone, Default)]
pub struct StagingArea {
    metadata: BTreeMap<String, Vec<u8>>,
    keys: BTreeMap<String, Vec<u8>>,
    removed_metadata: BTreeSet<String>,
    removed_keys: BTreeSet<String>,
    dirty: bool,
}

impl StagingArea {
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn staged_roles(&self) -> Vec<String> {
        self.metadata.keys().cloned().collect()
    }

    pub fn staged_keys(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }
}

/// A snapshot being edited.
#[derive(Debug, Clone)]
pub struct PolicyState {
    snapshot: Arc<PolicySnapshot>,
    staging: StagingArea,
}

impl PolicyState {
    /// Load the policy at the current tip of the policy reference. An unset
    /// reference yields an empty, uninitialized state.
    pub fn load(store: &dyn ObjectStore) -> Result<Self> {
        let tip = store.get_ref(POLICY_STATE_REF)?;
        if tip.is_zero() {
            log::debug!("{POLICY_STATE_REF} is unset, starting from an empty policy");
            return Ok(Self::from_snapshot(PolicySnapshot::default()));
        }
        Ok(Self::from_snapshot(PolicySnapshot::at_commit(store, &tip)?))
    }

    /// Load the policy at a historical commit. The commit must be reachable
    /// from the current tip through single-parent links only.
    pub fn load_at(store: &dyn ObjectStore, state_id: &ObjectId) -> Result<Self> {
        let current = store.get_ref(POLICY_STATE_REF)?;
        if state_id.is_zero() || current.is_zero() {
            return Err(PolicyError::NotFound(
                "cannot load policy at the zero state".to_string(),
            ));
        }
        if current == *state_id {
            return Self::load(store);
        }

        let mut cursor = current;
        while cursor != *state_id {
            let commit = store.read_commit(&cursor)?;
            match commit.parents.as_slice() {
                [] => {
                    return Err(PolicyError::NotFound(format!(
                        "state {state_id} in policy namespace"
                    )))
                }
                [parent] => cursor = *parent,
                _ => return Err(PolicyError::AmbiguousHistory(cursor.to_hex())),
            }
        }

        Ok(Self::from_snapshot(PolicySnapshot::at_commit(store, state_id)?))
    }

    /// An uncommitted state holding the initial root keys and metadata.
    pub fn initialize(root_keys: &[PublicKey], metadata: BTreeMap<String, Vec<u8>>) -> Result<Self> {
        let mut state = Self::from_snapshot(PolicySnapshot::default());
        state.stage_keys(root_keys)?;
        state.stage_metadata_batch(metadata)?;
        Ok(state)
    }

    fn from_snapshot(snapshot: PolicySnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            staging: StagingArea::default(),
        }
    }

    /// The last committed snapshot.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn tip(&self) -> ObjectId {
        self.snapshot.tip()
    }

    pub fn is_dirty(&self) -> bool {
        self.staging.dirty
    }

    /// Stage a role's metadata. A trailing `.json` on the name is dropped.
    pub fn stage_metadata(&mut self, role: &str, contents: Vec<u8>) -> Result<()> {
        let role = validate_name(name_without_extension(role))?;
        self.staging.removed_metadata.remove(role);
        self.staging.metadata.insert(role.to_string(), contents);
        self.staging.dirty = true;
        Ok(())
    }

    pub fn stage_metadata_batch(&mut self, metadata: BTreeMap<String, Vec<u8>>) -> Result<()> {
        for (role, contents) in metadata {
            self.stage_metadata(&role, contents)?;
        }
        Ok(())
    }

    /// Stage a public key under its key id.
    pub fn stage_key(&mut self, key: &PublicKey) -> Result<()> {
        let key_id = key.key_id()?;
        let contents = serde_json::to_vec(key)?;
        self.staging.removed_keys.remove(&key_id);
        self.staging.keys.insert(key_id, contents);
        self.staging.dirty = true;
        Ok(())
    }

    pub fn stage_keys(&mut self, keys: &[PublicKey]) -> Result<()> {
        keys.iter().try_for_each(|key| self.stage_key(key))
    }

    pub fn stage_metadata_and_commit(
        &mut self,
        store: &dyn ObjectStore,
        role: &str,
        contents: Vec<u8>,
    ) -> Result<()> {
        self.stage_metadata(role, contents)?;
        self.commit(store)
    }

    pub fn stage_key_and_commit(&mut self, store: &dyn ObjectStore, key: &PublicKey) -> Result<()> {
        self.stage_key(key)?;
        self.commit(store)
    }

    /// Remove roles and commit. Removing an absent role is not an error.
    pub fn remove_metadata(&mut self, store: &dyn ObjectStore, roles: &[&str]) -> Result<()> {
        for role in roles {
            let role = name_without_extension(role);
            self.staging.metadata.remove(role);
            self.staging.removed_metadata.insert(role.to_string());
        }
        self.staging.dirty = true;
        self.commit(store)
    }

    /// Remove keys and commit. Removing an absent key is not an error.
    pub fn remove_keys(&mut self, store: &dyn ObjectStore, key_ids: &[&str]) -> Result<()> {
        for key_id in key_ids {
            self.staging.keys.remove(*key_id);
            self.staging.removed_keys.insert(key_id.to_string());
        }
        self.staging.dirty = true;
        self.commit(store)
    }

    /// Write staged content as a new policy commit and advance the policy
    /// reference with compare-and-swap against the loaded tip.
    ///
    /// Does nothing when nothing is staged. On a lost race the staging
    /// area is kept and [`PolicyError::ConcurrentModification`] returned.
    pub fn commit(&mut self, store: &dyn ObjectStore) -> Result<()> {
        if !self.staging.dirty {
            return Ok(());
        }

        let metadata = merge_entries(
            store,
            &self.snapshot.metadata,
            &self.staging.metadata,
            &self.staging.removed_metadata,
            METADATA_EXTENSION,
        )?;
        let keys = merge_entries(
            store,
            &self.snapshot.keys,
            &self.staging.keys,
            &self.staging.removed_keys,
            KEY_EXTENSION,
        )?;

        let metadata_tree = store.write_tree(metadata.values().cloned().collect())?;
        let keys_tree = store.write_tree(keys.values().cloned().collect())?;
        let tree = store.write_tree(vec![
            TreeEntry::directory(METADATA_DIR, metadata_tree),
            TreeEntry::directory(KEYS_DIR, keys_tree),
        ])?;

        let parent = self.snapshot.tip;
        let commit = store.write_commit(
            &[parent],
            tree,
            &format!("gittuf: Writing state tree {tree}"),
        )?;
        store.cas_ref(POLICY_STATE_REF, &parent, &commit)?;
        log::info!("advanced {POLICY_STATE_REF} from {parent} to {commit}");

        self.snapshot = Arc::new(PolicySnapshot {
            tip: commit,
            tree,
            metadata,
            keys,
        });
        self.staging = StagingArea::default();
        Ok(())
    }
}

/// Unstaged, unremoved entries carried over; staged contents written fresh.
fn merge_entries(
    store: &dyn ObjectStore,
    existing: &BTreeMap<String, TreeEntry>,
    staged: &BTreeMap<String, Vec<u8>>,
    removed: &BTreeSet<String>,
    extension: &str,
) -> Result<BTreeMap<String, TreeEntry>> {
    let mut merged: BTreeMap<String, TreeEntry> = existing
        .iter()
        .filter(|(name, _)| !staged.contains_key(*name) && !removed.contains(*name))
        .map(|(name, entry)| (name.clone(), entry.clone()))
        .collect();
    for (name, contents) in staged {
        let id = store.write_blob(contents)?;
        merged.insert(name.clone(), TreeEntry::file(format!("{name}{extension}"), id));
    }
    Ok(merged)
}

fn validate_name(name: &str) -> Result<&str> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(PolicyError::InvalidName(format!("{name:?} is not a valid role name")));
    }
    Ok(name)
}

//! Last-trusted index: target to the policy state last verified for it.

use std::collections::BTreeMap;

use super::LAST_TRUSTED_REF;
use crate::error::{PolicyError, Result};
use crate::store::{ObjectId, ObjectStore};

/// Mapping from target identifier to trusted policy state, stored as a
/// single JSON blob behind [`LAST_TRUSTED_REF`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastTrustedIndex {
    /// Reference value the index was read from; the CAS expectation on write.
    observed: ObjectId,
    entries: BTreeMap<String, ObjectId>,
}

impl LastTrustedIndex {
    /// Read the index. An unset reference is an empty index.
    pub fn load(store: &dyn ObjectStore) -> Result<Self> {
        let observed = store.get_ref(LAST_TRUSTED_REF)?;
        if observed.is_zero() {
            return Ok(Self::default());
        }
        let bytes = store.read_blob(&observed)?;
        let entries = serde_json::from_slice(&bytes)
            .map_err(|e| PolicyError::Decode(format!("malformed last-trusted index: {e}")))?;
        Ok(Self { observed, entries })
    }

    pub fn get(&self, target: &str) -> Option<ObjectId> {
        self.entries.get(target).copied()
    }

    /// The trusted state for `target`, which must be present.
    pub fn last_trusted(&self, target: &str) -> Result<ObjectId> {
        self.get(target)
            .ok_or_else(|| PolicyError::NotFound(format!("no trusted state found for {target}")))
    }

    pub fn entries(&self) -> &BTreeMap<String, ObjectId> {
        &self.entries
    }

    /// Record `state` as trusted for `target` and write the index. The
    /// in-memory index is unchanged if the write fails.
    pub fn update(&mut self, store: &dyn ObjectStore, target: &str, state: ObjectId) -> Result<()> {
        let mut entries = self.entries.clone();
        entries.insert(target.to_string(), state);
        self.persist(store, entries)
    }

    /// Write the index as a new blob and advance the reference against the
    /// value observed at load time.
    pub fn write(&mut self, store: &dyn ObjectStore) -> Result<()> {
        self.persist(store, self.entries.clone())
    }

    fn persist(&mut self, store: &dyn ObjectStore, entries: BTreeMap<String, ObjectId>) -> Result<()> {
        let contents = serde_json::to_vec(&entries)?;
        let id = store.write_blob(&contents)?;
        store.cas_ref(LAST_TRUSTED_REF, &self.observed, &id)?;
        log::info!("advanced {LAST_TRUSTED_REF} to {id}");
        self.observed = id;
        self.entries = entries;
        Ok(())
    }
}

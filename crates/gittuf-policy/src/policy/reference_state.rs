//! Signed per-reference checkpoints.
//!
//! Each protected reference has its own log reference under
//! [`REFERENCE_STATE_REF`]. The log reference points at a blob holding a
//! signed [`ReferenceStateEntry`]; `lastEntry` links to the blob it
//! superseded, so earlier entries stay reachable.

use serde::{Deserialize, Serialize};

use super::REFERENCE_STATE_REF;
use crate::crypto::{encode_canonical, signing, Ed25519KeyPair, PublicKey};
use crate::error::{PolicyError, Result};
use crate::metadata::SignedEnvelope;
use crate::store::{ObjectId, ObjectStore};

/// Last trusted point of a protected reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceStateEntry {
    /// Blob id of the entry this one supersedes; zero for the first.
    pub last_entry: ObjectId,
    pub tip: ObjectId,
}

impl ReferenceStateEntry {
    /// True for the "no prior trust" entry.
    pub fn is_zero(&self) -> bool {
        self.last_entry.is_zero() && self.tip.is_zero()
    }
}

/// Access to the reference-state log.
pub struct ReferenceStateLog;

impl ReferenceStateLog {
    /// Log reference for a protected reference name.
    pub fn namespace(ref_name: &str) -> String {
        format!("{REFERENCE_STATE_REF}/{ref_name}")
    }

    /// Load the current entry for `ref_name`, accepting it only if its
    /// signature verifies with one of `trusted_keys`. An unset log is the
    /// zero entry.
    pub fn load(
        store: &dyn ObjectStore,
        ref_name: &str,
        trusted_keys: &[PublicKey],
    ) -> Result<ReferenceStateEntry> {
        let head = store.get_ref(&Self::namespace(ref_name))?;
        if head.is_zero() {
            log::debug!("no reference state recorded for {ref_name}");
            return Ok(ReferenceStateEntry::default());
        }
        Self::load_entry(store, &head, ref_name, trusted_keys)
    }

    /// Load and check one entry blob.
    pub fn load_entry(
        store: &dyn ObjectStore,
        entry_id: &ObjectId,
        ref_name: &str,
        trusted_keys: &[PublicKey],
    ) -> Result<ReferenceStateEntry> {
        let envelope = SignedEnvelope::from_bytes(&store.read_blob(entry_id)?)?;
        let entry: ReferenceStateEntry = envelope.payload()?;
        let message = encode_canonical(&entry)?;

        // Entries carry a single signature.
        let signature = envelope
            .signatures
            .first()
            .ok_or_else(|| PolicyError::UntrustedEntry(ref_name.to_string()))?;

        for key in trusted_keys {
            let verifying_key = key.verifying_key()?;
            if signing::verify_from_hex(&verifying_key, &message, &signature.sig).is_ok() {
                return Ok(entry);
            }
        }

        log::warn!("reference state {entry_id} for {ref_name} has no trusted signature");
        Err(PolicyError::UntrustedEntry(ref_name.to_string()))
    }

    /// Write a new entry recording `tip`, signed by `key`, and advance the
    /// log reference with compare-and-swap. Returns the new entry's id.
    pub fn append(
        store: &dyn ObjectStore,
        ref_name: &str,
        tip: ObjectId,
        key: &Ed25519KeyPair,
    ) -> Result<ObjectId> {
        let namespace = Self::namespace(ref_name);
        let previous = store.get_ref(&namespace)?;
        let entry = ReferenceStateEntry {
            last_entry: previous,
            tip,
        };
        let envelope = SignedEnvelope::sign(&entry, &[key])?;
        let id = store.write_blob(&envelope.to_bytes()?)?;
        store.cas_ref(&namespace, &previous, &id)?;
        log::info!("recorded {ref_name} at {tip} in {namespace}");
        Ok(id)
    }

    /// All entries for `ref_name`, newest first, each checked against
    /// `trusted_keys`.
    pub fn history(
        store: &dyn ObjectStore,
        ref_name: &str,
        trusted_keys: &[PublicKey],
    ) -> Result<Vec<(ObjectId, ReferenceStateEntry)>> {
        let mut entries = Vec::new();
        let mut cursor = store.get_ref(&Self::namespace(ref_name))?;
        while !cursor.is_zero() {
            let entry = Self::load_entry(store, &cursor, ref_name, trusted_keys)?;
            entries.push((cursor, entry));
            cursor = entry.last_entry;
        }
        Ok(entries)
    }
}

//! Signed envelopes.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::crypto::{encode_canonical, signing, Ed25519KeyPair, PublicKey};
use crate::error::{PolicyError, Result};

/// One signature over an envelope's canonical payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub keyid: String,
    /// Hex-encoded signature bytes.
    pub sig: String,
}

/// A payload plus the signatures over its canonical encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub signatures: Vec<Signature>,
    pub signed: serde_json::Value,
}

impl SignedEnvelope {
    /// Wrap a payload and sign it with each key in order.
    pub fn sign<T: Serialize>(payload: &T, keys: &[&Ed25519KeyPair]) -> Result<Self> {
        let mut envelope = Self {
            signatures: Vec::new(),
            signed: serde_json::to_value(payload)?,
        };
        for key in keys {
            envelope.add_signature(key)?;
        }
        Ok(envelope)
    }

    /// Append a signature from `key`, replacing any earlier one by the same key.
    pub fn add_signature(&mut self, key: &Ed25519KeyPair) -> Result<()> {
        let keyid = key.key_id()?;
        let message = self.canonical_payload()?;
        let sig = signing::sign_to_hex(key.signing_key(), &message);
        self.signatures.retain(|s| s.keyid != keyid);
        self.signatures.push(Signature { keyid, sig });
        Ok(())
    }

    /// Decode an envelope; structural problems are [`PolicyError::Decode`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| PolicyError::Decode(format!("malformed signed envelope: {e}")))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// The bytes every signature is computed over.
    pub fn canonical_payload(&self) -> Result<Vec<u8>> {
        encode_canonical(&self.signed)
    }

    /// Decode the inner payload.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.signed.clone())
            .map_err(|e| PolicyError::Decode(format!("malformed signed payload: {e}")))
    }

    /// Key ids named by the signatures, without checking them.
    pub fn unverified_key_ids(&self) -> Vec<String> {
        self.signatures.iter().map(|s| s.keyid.clone()).collect()
    }

    /// Key ids among `allowed` whose signature verifies with the matching
    /// key in `keys`. Unknown, disallowed and invalid signatures are ignored.
    pub fn verified_key_ids(
        &self,
        keys: &BTreeMap<String, PublicKey>,
        allowed: &[String],
    ) -> Result<BTreeSet<String>> {
        let message = self.canonical_payload()?;
        let mut verified = BTreeSet::new();
        for signature in &self.signatures {
            if !allowed.contains(&signature.keyid) {
                continue;
            }
            let Some(key) = keys.get(&signature.keyid) else {
                continue;
            };
            match key.verify(&message, &signature.sig) {
                Ok(()) => {
                    verified.insert(signature.keyid.clone());
                }
                Err(e) => log::warn!("signature by {} rejected: {e}", signature.keyid),
            }
        }
        Ok(verified)
    }
}

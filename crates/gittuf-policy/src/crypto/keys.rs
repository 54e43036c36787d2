//! Ed25519 key pairs and TUF-style public key documents.
//!
//! A [`PublicKey`] is the JSON document stored under `keys/<keyid>.pub`
//! and embedded in root and delegation metadata. Its key id is the hex
//! SHA-256 of its canonical encoding.

use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::crypto::{canonical::encode_canonical, signing};
use crate::error::{PolicyError, Result};

/// Key type and scheme tag for Ed25519 keys.
pub const KEY_TYPE_ED25519: &str = "ed25519";

/// An Ed25519 key pair for signing metadata.
///
/// The signing key is zeroized on drop to prevent private key leakage.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Ed25519KeyPair {
    /// Generate a new random Ed25519 key pair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Reconstruct a key pair from raw signing key bytes.
    pub fn from_signing_key_bytes(bytes: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// The public half as a key document.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::ed25519(&self.verifying_key)
    }

    /// Key id of the public half.
    pub fn key_id(&self) -> Result<String> {
        self.public_key().key_id()
    }
}

impl Drop for Ed25519KeyPair {
    fn drop(&mut self) {
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

/// Public key material inside a key document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Hex-encoded public key bytes.
    pub public: String,
}

/// A public key document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub keytype: String,
    pub scheme: String,
    pub keyval: KeyValue,
}

impl PublicKey {
    /// Build a key document for an Ed25519 verifying key.
    pub fn ed25519(verifying_key: &VerifyingKey) -> Self {
        Self {
            keytype: KEY_TYPE_ED25519.to_string(),
            scheme: KEY_TYPE_ED25519.to_string(),
            keyval: KeyValue {
                public: hex::encode(verifying_key.to_bytes()),
            },
        }
    }

    /// Hex SHA-256 of the canonical encoding.
    pub fn key_id(&self) -> Result<String> {
        let canonical = encode_canonical(self)?;
        Ok(hex::encode(Sha256::digest(&canonical)))
    }

    /// Decode the Ed25519 verifying key.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        if self.keytype != KEY_TYPE_ED25519 || self.scheme != KEY_TYPE_ED25519 {
            return Err(PolicyError::InvalidKey(format!(
                "unsupported key type {}/{}",
                self.keytype, self.scheme
            )));
        }
        let bytes = hex::decode(&self.keyval.public)
            .map_err(|e| PolicyError::InvalidKey(format!("invalid hex public key: {e}")))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| PolicyError::InvalidKey("public key must be 32 bytes".into()))?;
        VerifyingKey::from_bytes(&array)
            .map_err(|e| PolicyError::InvalidKey(format!("invalid verifying key: {e}")))
    }

    /// Verify a hex-encoded signature over `message` with this key.
    pub fn verify(&self, message: &[u8], signature_hex: &str) -> Result<()> {
        signing::verify_from_hex(&self.verifying_key()?, message, signature_hex)
    }
}

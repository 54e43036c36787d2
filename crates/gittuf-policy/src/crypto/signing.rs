//! Ed25519 signing and verification.
//!
//! Signatures travel hex-encoded inside metadata envelopes.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::error::{PolicyError, Result};

/// Sign a message with an Ed25519 signing key.
pub fn sign(signing_key: &SigningKey, message: &[u8]) -> Signature {
    signing_key.sign(message)
}

/// Verify an Ed25519 signature against a public key and message.
pub fn verify(verifying_key: &VerifyingKey, message: &[u8], signature: &Signature) -> Result<()> {
    verifying_key
        .verify(message, signature)
        .map_err(|_| PolicyError::SignatureInvalid)
}

/// Sign a message and return the signature as a hex string.
pub fn sign_to_hex(signing_key: &SigningKey, message: &[u8]) -> String {
    hex::encode(sign(signing_key, message).to_bytes())
}

/// Verify raw signature bytes.
pub fn verify_bytes(verifying_key: &VerifyingKey, message: &[u8], signature: &[u8]) -> Result<()> {
    let sig_array: [u8; 64] = signature
        .try_into()
        .map_err(|_| PolicyError::InvalidKey("signature must be 64 bytes".into()))?;
    verify(verifying_key, message, &Signature::from_bytes(&sig_array))
}

/// Verify a hex-encoded signature.
pub fn verify_from_hex(verifying_key: &VerifyingKey, message: &[u8], signature_hex: &str) -> Result<()> {
    let sig_bytes = hex::decode(signature_hex)
        .map_err(|e| PolicyError::InvalidKey(format!("invalid hex signature: {e}")))?;
    verify_bytes(verifying_key, message, &sig_bytes)
}

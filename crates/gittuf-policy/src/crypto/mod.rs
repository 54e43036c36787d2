//! Cryptographic primitives for gittuf-policy.
//!
//! This module provides:
//! - Canonical JSON encoding of signed payloads
//! - Ed25519 key pairs and TUF-style public key documents
//! - Ed25519 signing and verification over hex-encoded signatures

pub mod canonical;
pub mod keys;
pub mod signing;

pub use canonical::encode_canonical;
pub use keys::{Ed25519KeyPair, KeyValue, PublicKey};

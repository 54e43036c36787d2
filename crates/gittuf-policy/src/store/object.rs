//! Object model: ids, blobs, trees and commits.
//!
//! Ids are SHA-256 over a kind header followed by the payload: raw bytes
//! for blobs, canonical JSON for trees and commits. Trees keep their
//! entries sorted by name, so identical content always hashes to the same
//! id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::crypto::canonical::encode_canonical;
use crate::error::{PolicyError, Result};

/// Content identifier of a stored object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// The zero id: "no object" / unset reference.
    pub const ZERO: ObjectId = ObjectId([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hash a payload under a kind header.
    pub fn digest(kind: &str, payload: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(format!("{kind} {}\0", payload.len()).as_bytes());
        hasher.update(payload);
        Self(hasher.finalize().into())
    }
}

impl FromStr for ObjectId {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| PolicyError::Decode(format!("invalid object id {s:?}: {e}")))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| PolicyError::Decode(format!("object id {s:?} must be 32 bytes")))?;
        Ok(Self(array))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Kind of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMode {
    File,
    Directory,
}

/// An entry in a tree object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub mode: EntryMode,
    pub id: ObjectId,
}

impl TreeEntry {
    pub fn file(name: impl Into<String>, id: ObjectId) -> Self {
        Self {
            name: name.into(),
            mode: EntryMode::File,
            id,
        }
    }

    pub fn directory(name: impl Into<String>, id: ObjectId) -> Self {
        Self {
            name: name.into(),
            mode: EntryMode::Directory,
            id,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.mode == EntryMode::Directory
    }
}

/// A directory listing, sorted by entry name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Create a tree; entries are sorted by name.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self { entries }
    }

    pub fn entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// A commit: a tree plus its parent links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub message: String,
    /// Microseconds since Unix epoch.
    pub timestamp: u64,
}

/// Any stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Object {
    Blob(#[serde(with = "base64_bytes")] Vec<u8>),
    Tree(Tree),
    Commit(Commit),
}

impl Object {
    pub fn kind(&self) -> &'static str {
        match self {
            Object::Blob(_) => "blob",
            Object::Tree(_) => "tree",
            Object::Commit(_) => "commit",
        }
    }

    /// Content id of this object.
    pub fn id(&self) -> Result<ObjectId> {
        let id = match self {
            Object::Blob(contents) => ObjectId::digest("blob", contents),
            Object::Tree(tree) => ObjectId::digest("tree", &encode_canonical(tree)?),
            Object::Commit(commit) => ObjectId::digest("commit", &encode_canonical(commit)?),
        };
        Ok(id)
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}

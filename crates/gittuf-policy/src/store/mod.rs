//! Content-addressed object store capability.
//!
//! The policy engine consumes a small storage interface: blobs, sorted
//! directory trees, linear commits and references advanced with
//! compare-and-swap. Implementations provide four primitives (`put`, `get`,
//! `get_ref`, `cas_ref`); the typed read/write helpers and tree diffing are
//! provided on top of them.
//!
//! # Implementations
//!
//! - [`memory::MemoryStore`]: in-process maps, for tests and embedding.
//! - [`fs::FsStore`]: one JSON file per object under a directory.

pub mod diff;
pub mod fs;
pub mod memory;
pub mod object;

pub use diff::{Change, ChangeKind};
pub use fs::FsStore;
pub use memory::MemoryStore;
pub use object::{Commit, EntryMode, Object, ObjectId, Tree, TreeEntry};

use crate::error::{PolicyError, Result};

/// Storage capability consumed by the policy engine.
///
/// All reference mutation goes through [`ObjectStore::cas_ref`]; a losing
/// writer gets [`PolicyError::ConcurrentModification`] and must reload.
pub trait ObjectStore {
    /// Persist an object under its id. Writing an existing id is a no-op.
    fn put(&self, id: &ObjectId, object: &Object) -> Result<()>;

    /// Fetch an object, `None` if absent.
    fn get(&self, id: &ObjectId) -> Result<Option<Object>>;

    /// Current value of a reference; [`ObjectId::ZERO`] when unset.
    fn get_ref(&self, name: &str) -> Result<ObjectId>;

    /// Set `name` to `new` only if it currently holds `expected`.
    fn cas_ref(&self, name: &str, expected: &ObjectId, new: &ObjectId) -> Result<()>;

    /// Write an object and return its content id.
    fn write_object(&self, object: &Object) -> Result<ObjectId> {
        let id = object.id()?;
        self.put(&id, object)?;
        log::debug!("wrote {} {}", object.kind(), id);
        Ok(id)
    }

    /// Fetch an object that must exist.
    fn read_object(&self, id: &ObjectId) -> Result<Object> {
        self.get(id)?
            .ok_or_else(|| PolicyError::Store(format!("object {id} is missing")))
    }

    fn write_blob(&self, contents: &[u8]) -> Result<ObjectId> {
        self.write_object(&Object::Blob(contents.to_vec()))
    }

    fn read_blob(&self, id: &ObjectId) -> Result<Vec<u8>> {
        match self.read_object(id)? {
            Object::Blob(contents) => Ok(contents),
            other => Err(unexpected_kind(id, "blob", &other)),
        }
    }

    /// Write a tree. Entries are sorted by name before hashing.
    fn write_tree(&self, entries: Vec<TreeEntry>) -> Result<ObjectId> {
        self.write_object(&Object::Tree(Tree::new(entries)))
    }

    /// Read a tree. The zero id names the empty tree.
    fn read_tree(&self, id: &ObjectId) -> Result<Tree> {
        if id.is_zero() {
            return Ok(Tree::default());
        }
        match self.read_object(id)? {
            Object::Tree(tree) => Ok(tree),
            other => Err(unexpected_kind(id, "tree", &other)),
        }
    }

    fn write_commit(&self, parents: &[ObjectId], tree: ObjectId, message: &str) -> Result<ObjectId> {
        let commit = Commit {
            tree,
            parents: parents.iter().copied().filter(|p| !p.is_zero()).collect(),
            message: message.to_string(),
            timestamp: crate::time::now_micros(),
        };
        self.write_object(&Object::Commit(commit))
    }

    fn read_commit(&self, id: &ObjectId) -> Result<Commit> {
        match self.read_object(id)? {
            Object::Commit(commit) => Ok(commit),
            other => Err(unexpected_kind(id, "commit", &other)),
        }
    }

    /// Path-level differences between two trees.
    fn diff_trees(&self, from: &ObjectId, to: &ObjectId) -> Result<Vec<Change>> {
        diff::diff_trees(self, from, to)
    }
}

fn unexpected_kind(id: &ObjectId, expected: &str, found: &Object) -> PolicyError {
    PolicyError::Store(format!(
        "object {id} is a {}, expected a {expected}",
        found.kind()
    ))
}

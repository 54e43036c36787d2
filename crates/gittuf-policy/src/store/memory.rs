//! In-memory object store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::object::{Object, ObjectId};
use super::ObjectStore;
use crate::error::{PolicyError, Result};

/// An [`ObjectStore`] backed by in-process maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<ObjectId, Object>>,
    refs: Mutex<HashMap<String, ObjectId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct objects stored.
    pub fn object_count(&self) -> Result<usize> {
        Ok(lock(&self.objects)?.len())
    }

    /// Names of all references currently set.
    pub fn ref_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = lock(&self.refs)?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| PolicyError::Store("memory store lock poisoned".into()))
}

impl ObjectStore for MemoryStore {
    fn put(&self, id: &ObjectId, object: &Object) -> Result<()> {
        lock(&self.objects)?
            .entry(*id)
            .or_insert_with(|| object.clone());
        Ok(())
    }

    fn get(&self, id: &ObjectId) -> Result<Option<Object>> {
        Ok(lock(&self.objects)?.get(id).cloned())
    }

    fn get_ref(&self, name: &str) -> Result<ObjectId> {
        Ok(lock(&self.refs)?.get(name).copied().unwrap_or(ObjectId::ZERO))
    }

    fn cas_ref(&self, name: &str, expected: &ObjectId, new: &ObjectId) -> Result<()> {
        let mut refs = lock(&self.refs)?;
        let actual = refs.get(name).copied().unwrap_or(ObjectId::ZERO);
        if actual != *expected {
            return Err(PolicyError::ConcurrentModification {
                reference: name.to_string(),
                expected: expected.to_hex(),
                actual: actual.to_hex(),
            });
        }
        if new.is_zero() {
            refs.remove(name);
        } else {
            refs.insert(name.to_string(), *new);
        }
        Ok(())
    }
}

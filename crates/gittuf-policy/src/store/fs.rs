//! Filesystem-backed object store.
//!
//! Layout under `base_dir`:
//!
//! ```text
//! {base_dir}/
//! ├── objects/
//! │   └── {object_id}.json   { "version": 1, "object": { ... } }
//! └── refs/...                one file per reference, holding a hex id
//! ```
//!
//! Object files are written to a sibling temp file and renamed into place.
//! Reference names must start with `refs/` and may not end in `.lock`.
//! Reference updates take a `{ref}.lock` file with `create_new`, compare
//! the current value, then rename the lock over the reference. A held lock
//! is reported as a concurrent modification.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::object::{Object, ObjectId};
use super::ObjectStore;
use crate::error::{PolicyError, Result};

const OBJECT_FILE_VERSION: u32 = 1;
const OBJECTS_DIR: &str = "objects";
const REFS_PREFIX: &str = "refs/";
const LOCK_SUFFIX: &str = ".lock";

/// Wrapper written to disk for each object.
#[derive(Debug, Serialize, Deserialize)]
struct ObjectFile {
    version: u32,
    object: Object,
}

/// An [`ObjectStore`] persisting objects and refs as files.
pub struct FsStore {
    base_dir: PathBuf,
}

impl FsStore {
    /// Open (or create) a store rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(base_dir.join(OBJECTS_DIR))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.base_dir.join(OBJECTS_DIR).join(format!("{id}.json"))
    }

    fn ref_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let valid = name.starts_with(REFS_PREFIX)
            && !name.ends_with(LOCK_SUFFIX)
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(PolicyError::Store(format!("invalid reference name {name:?}")));
        }
        Ok(self.base_dir.join(relative))
    }

    /// Compare and write while holding the lock. Returns whether the lock
    /// file now carries the new value (false when the ref was deleted).
    fn update_locked(
        path: &Path,
        lock: &mut File,
        name: &str,
        expected: &ObjectId,
        new: &ObjectId,
    ) -> Result<bool> {
        let actual = Self::read_ref_file(path)?;
        if actual != *expected {
            return Err(PolicyError::ConcurrentModification {
                reference: name.to_string(),
                expected: expected.to_hex(),
                actual: actual.to_hex(),
            });
        }
        if new.is_zero() {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
            return Ok(false);
        }
        lock.write_all(new.to_hex().as_bytes())?;
        lock.sync_all()?;
        Ok(true)
    }

    fn read_ref_file(path: &Path) -> Result<ObjectId> {
        if !path.exists() {
            return Ok(ObjectId::ZERO);
        }
        let contents = std::fs::read_to_string(path)?;
        contents.trim().parse()
    }
}

impl ObjectStore for FsStore {
    fn put(&self, id: &ObjectId, object: &Object) -> Result<()> {
        // An unreadable file under this id is replaced, not trusted.
        if matches!(self.get(id), Ok(Some(_))) {
            return Ok(());
        }
        let file = ObjectFile {
            version: OBJECT_FILE_VERSION,
            object: object.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| PolicyError::Store(format!("cannot encode object {id}: {e}")))?;
        write_atomic(&self.object_path(id), &json)
    }

    fn get(&self, id: &ObjectId) -> Result<Option<Object>> {
        let path = self.object_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        let file: ObjectFile = serde_json::from_slice(&bytes)
            .map_err(|e| PolicyError::Store(format!("malformed object file {}: {e}", path.display())))?;
        if file.version != OBJECT_FILE_VERSION {
            return Err(PolicyError::Store(format!(
                "unsupported object file version {} for {id}",
                file.version
            )));
        }
        if file.object.id()? != *id {
            return Err(PolicyError::Store(format!("object {id} failed its content check")));
        }
        Ok(Some(file.object))
    }

    fn get_ref(&self, name: &str) -> Result<ObjectId> {
        Self::read_ref_file(&self.ref_path(name)?)
    }

    fn cas_ref(&self, name: &str, expected: &ObjectId, new: &ObjectId) -> Result<()> {
        let path = self.ref_path(name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut lock_name = path.clone().into_os_string();
        lock_name.push(LOCK_SUFFIX);
        let lock_path = PathBuf::from(lock_name);

        let mut lock = match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(PolicyError::ConcurrentModification {
                    reference: name.to_string(),
                    expected: expected.to_hex(),
                    actual: "locked".to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let result = Self::update_locked(&path, &mut lock, name, expected, new);
        drop(lock);

        match result {
            Ok(true) => {
                std::fs::rename(&lock_path, &path)?;
                Ok(())
            }
            Ok(false) => {
                std::fs::remove_file(&lock_path)?;
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&lock_path);
                Err(e)
            }
        }
    }
}

/// Write `data` to `path` through a uniquely named sibling temp file, so
/// readers never observe a partial file.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(format!(".{:016x}.tmp", rand::random::<u64>()));
    let tmp_path = PathBuf::from(tmp_name);

    let written = File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        })
        .and_then(|()| std::fs::rename(&tmp_path, path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

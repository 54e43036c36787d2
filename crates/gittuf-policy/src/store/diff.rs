//! Path-level tree diff with rename detection.
//!
//! Subtrees with identical ids are skipped without being read. A removed
//! path and an added path carrying the same blob id are reported as a
//! single rename.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::object::{ObjectId, TreeEntry};
use super::ObjectStore;
use crate::error::Result;

/// Kind of a path-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    Renamed,
}

/// A single changed path. `from` is absent for additions, `to` for removals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub from: Option<String>,
    pub to: Option<String>,
    pub kind: ChangeKind,
}

impl Change {
    /// The path this change is reported under (destination if any).
    pub fn path(&self) -> &str {
        self.to
            .as_deref()
            .or(self.from.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct Collected {
    removed: BTreeMap<String, ObjectId>,
    added: BTreeMap<String, ObjectId>,
    modified: Vec<String>,
}

/// Compute the ordered list of path changes from tree `from` to tree `to`.
pub fn diff_trees<S: ObjectStore + ?Sized>(
    store: &S,
    from: &ObjectId,
    to: &ObjectId,
) -> Result<Vec<Change>> {
    let mut collected = Collected::default();
    if from != to {
        walk(store, Some(*from), Some(*to), "", &mut collected)?;
    }

    let mut changes: Vec<Change> = collected
        .modified
        .into_iter()
        .map(|path| Change {
            from: Some(path.clone()),
            to: Some(path),
            kind: ChangeKind::Modified,
        })
        .collect();

    let mut added = collected.added;
    for (path, id) in collected.removed {
        let renamed_to = added
            .iter()
            .find(|(_, added_id)| **added_id == id)
            .map(|(p, _)| p.clone());
        match renamed_to {
            Some(to) => {
                added.remove(&to);
                changes.push(Change {
                    from: Some(path),
                    to: Some(to),
                    kind: ChangeKind::Renamed,
                });
            }
            None => changes.push(Change {
                from: Some(path),
                to: None,
                kind: ChangeKind::Removed,
            }),
        }
    }
    changes.extend(added.into_keys().map(|path| Change {
        from: None,
        to: Some(path),
        kind: ChangeKind::Added,
    }));

    changes.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(changes)
}

fn walk<S: ObjectStore + ?Sized>(
    store: &S,
    from: Option<ObjectId>,
    to: Option<ObjectId>,
    prefix: &str,
    out: &mut Collected,
) -> Result<()> {
    let from_tree = match from {
        Some(id) => store.read_tree(&id)?.entries,
        None => Vec::new(),
    };
    let to_tree = match to {
        Some(id) => store.read_tree(&id)?.entries,
        None => Vec::new(),
    };
    let from_entries: BTreeMap<&str, &TreeEntry> =
        from_tree.iter().map(|e| (e.name.as_str(), e)).collect();
    let to_entries: BTreeMap<&str, &TreeEntry> =
        to_tree.iter().map(|e| (e.name.as_str(), e)).collect();
    let names: BTreeSet<&str> = from_entries.keys().chain(to_entries.keys()).copied().collect();

    for name in names {
        let path = join(prefix, name);
        match (from_entries.get(name), to_entries.get(name)) {
            (Some(a), Some(b)) if a.id == b.id && a.mode == b.mode => {}
            (Some(a), Some(b)) => match (a.is_directory(), b.is_directory()) {
                (true, true) => walk(store, Some(a.id), Some(b.id), &path, out)?,
                (false, false) => out.modified.push(path),
                (true, false) => {
                    walk(store, Some(a.id), None, &path, out)?;
                    out.added.insert(path, b.id);
                }
                (false, true) => {
                    out.removed.insert(path.clone(), a.id);
                    walk(store, None, Some(b.id), &path, out)?;
                }
            },
            (Some(a), None) if a.is_directory() => walk(store, Some(a.id), None, &path, out)?,
            (Some(a), None) => {
                out.removed.insert(path, a.id);
            }
            (None, Some(b)) if b.is_directory() => walk(store, None, Some(b.id), &path, out)?,
            (None, Some(b)) => {
                out.added.insert(path, b.id);
            }
            (None, None) => {}
        }
    }
    Ok(())
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

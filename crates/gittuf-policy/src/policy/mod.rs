//! Policy namespace: role metadata, keys, trusted states.
//!
//! # Layout
//!
//! ```text
//! refs/gittuf/policy-state           linear history of policy commits
//!   {commit}.tree
//!   ├── keys/
//!   │   └── {key_id}.pub
//!   └── metadata/
//!       └── {role}.json
//! refs/gittuf/last-trusted           blob: { target: state_id }
//! refs/gittuf/reference-state/{ref}  blob: signed { lastEntry, tip }
//! ```
//!
//! # Modules
//!
//! - [`state`]: snapshots, staging and atomic policy commits.
//! - [`last_trusted`]: the last-trusted index.
//! - [`reference_state`]: the signed per-ref checkpoint log.

pub mod last_trusted;
pub mod reference_state;
pub mod state;

pub use last_trusted::LastTrustedIndex;
pub use reference_state::{ReferenceStateEntry, ReferenceStateLog};
pub use state::{PolicySnapshot, PolicyState, StagingArea};

pub const POLICY_STATE_REF: &str = "refs/gittuf/policy-state";
pub const LAST_TRUSTED_REF: &str = "refs/gittuf/last-trusted";
pub const REFERENCE_STATE_REF: &str = "refs/gittuf/reference-state";

pub const METADATA_DIR: &str = "metadata";
pub const KEYS_DIR: &str = "keys";

pub(crate) const METADATA_EXTENSION: &str = ".json";
pub(crate) const KEY_EXTENSION: &str = ".pub";

/// Strip a known file-type suffix from a tree entry name.
pub(crate) fn name_without_extension(file_name: &str) -> &str {
    [METADATA_EXTENSION, KEY_EXTENSION]
        .iter()
        .find_map(|ext| file_name.strip_suffix(ext))
        .unwrap_or(file_name)
}

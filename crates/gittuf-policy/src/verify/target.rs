//! Target identifiers.

use std::fmt;
use std::str::FromStr;

use crate::error::{PolicyError, Result};

const GIT_SCHEME: &str = "git:";

/// A protected target. Only references in the protected repository are
/// supported, written `git:refs/...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    GitRef(String),
}

impl Target {
    /// Name of the reference in the content store.
    pub fn ref_name(&self) -> &str {
        match self {
            Target::GitRef(name) => name,
        }
    }
}

impl FromStr for Target {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.strip_prefix(GIT_SCHEME) {
            Some(name) if name.starts_with("refs/") && name.len() > "refs/".len() => {
                Ok(Target::GitRef(name.to_string()))
            }
            _ => Err(PolicyError::UnsupportedTarget(s.to_string())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::GitRef(name) => write!(f, "{GIT_SCHEME}{name}"),
        }
    }
}

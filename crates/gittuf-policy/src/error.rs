//! Error types for gittuf-policy.
//!
//! Every failure aborts the enclosing operation and carries the offending
//! identifier(s). Nothing is downgraded to a warning.

/// Policy error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("Delegation not found for target {0}")]
    NoDelegationFound(String),

    #[error("Malformed root metadata: {0}")]
    MalformedRoot(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unauthorized change to file {path}")]
    UnauthorizedChange { path: String },

    #[error("Role {role} has recorded different hash value {recorded} from current hash {actual}")]
    Drift {
        role: String,
        recorded: String,
        actual: String,
    },

    #[error("Reference {reference} moved: expected {expected}, found {actual}")]
    ConcurrentModification {
        reference: String,
        expected: String,
        actual: String,
    },

    #[error("No entry for {0} carries a signature from a trusted key")]
    UntrustedEntry(String),

    #[error("State {0} has multiple parents")]
    AmbiguousHistory(String),

    #[error("Unsupported target: {0}")]
    UnsupportedTarget(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Role {role} requires {required} valid signatures, found {valid}")]
    ThresholdNotMet {
        role: String,
        required: u32,
        valid: usize,
    },

    #[error("Role {role} expired at {expires}")]
    MetadataExpired { role: String, expires: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PolicyError {
    fn from(e: serde_json::Error) -> Self {
        PolicyError::Decode(e.to_string())
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, PolicyError>;

//! Canonical JSON encoding.
//!
//! Signed payloads are encoded with object keys in sorted order and no
//! insignificant whitespace, so that the same logical document always
//! produces the same bytes. Floating point numbers have no canonical form
//! and are rejected.

use serde::Serialize;
use serde_json::Value;

use crate::error::{PolicyError, Result};

/// Encode a serializable value as canonical JSON bytes.
pub fn encode_canonical<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    reject_floats(&value)?;
    // serde_json's Map is ordered by key, so compact output is canonical.
    Ok(serde_json::to_vec(&value)?)
}

fn reject_floats(value: &Value) -> Result<()> {
    match value {
        Value::Number(n) if n.is_f64() => Err(PolicyError::Decode(format!(
            "canonical JSON does not permit floating point value {n}"
        ))),
        Value::Array(items) => items.iter().try_for_each(reject_floats),
        Value::Object(map) => map.values().try_for_each(reject_floats),
        _ => Ok(()),
    }
}

//! Time utilities.
//!
//! Commit timestamps are Unix epoch microseconds (u64); role expiry uses
//! RFC 3339 through `chrono`.

use chrono::{DateTime, Duration, Utc};

/// Return the current time as microseconds since Unix epoch.
pub fn now_micros() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Default expiry for freshly built role metadata: one year from now.
pub fn default_expiry() -> DateTime<Utc> {
    Utc::now() + Duration::days(365)
}

//! Content hash algorithm (§6): SHA-256 of
//! `"{external_id}:{updated_at:O}:{message_count}"`, truncated to 16 hex
//! chars uppercase.
//!
//! Used only as an update-detection fingerprint — never as a primary key
//! (§9). Collision probability at the scale this system operates at
//! (thousands of sessions per user) is negligible but non-zero; callers must
//! not rely on it for uniqueness.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Compute the content hash for a session given its natural key fields.
pub fn content_hash(external_id: &str, updated_at: DateTime<Utc>, message_count: usize) -> String {
    let input = format!(
        "{}:{}:{}",
        external_id,
        updated_at.to_rfc3339(),
        message_count
    );
    let digest = Sha256::digest(input.as_bytes());
    let hex = hex::encode(digest);
    hex[..16].to_uppercase()
}

//! 24-character hexadecimal record identifiers.
//!
//! Layout: 4-byte big-endian seconds timestamp, 5 bytes random per process,
//! 3-byte wrapping counter.

use once_cell::sync::Lazy;
use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};
use validator::ValidationError;

pub const OBJECT_ID_LEN: usize = 24;

static PROCESS_UNIQUE: Lazy<[u8; 5]> = Lazy::new(|| rand::thread_rng().gen());
static COUNTER: Lazy<AtomicU32> =
    Lazy::new(|| AtomicU32::new(rand::thread_rng().gen_range(0..0x00FF_FFFF)));

/// Generates a new identifier.
pub fn new_object_id() -> String {
    let secs = chrono::Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32;
    let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00FF_FFFF;

    let mut bytes = [0u8; 12];
    bytes[..4].copy_from_slice(&secs.to_be_bytes());
    bytes[4..9].copy_from_slice(&*PROCESS_UNIQUE);
    bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
    hex::encode(bytes)
}

/// True when `value` is exactly 24 lowercase hexadecimal characters, the only
/// form [`new_object_id`] produces.
pub fn is_object_id(value: &str) -> bool {
    value.len() == OBJECT_ID_LEN && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// `validator` hook for identifier fields.
pub fn validate_object_id(value: &str) -> Result<(), ValidationError> {
    if is_object_id(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("object_id");
        err.message = Some("must be a 24-character lowercase hexadecimal id".into());
        Err(err)
    }
}

//! Snapshot fingerprinting
//!
//! A 32-bit rolling hash over the UTF-16 code units of the JSON text,
//! rendered in base 36. Used for change detection and integrity checks,
//! not as a security control.

use serde::Serialize;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Fingerprint any serializable value
///
/// The value goes through `serde_json::Value` first so object keys are
/// emitted in sorted order: a typed value and the same value read back as
/// raw JSON produce the same fingerprint.
///
/// # Errors
/// Returns an error if the value cannot be serialized
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_value(value)?;
    let text = serde_json::to_string(&canonical)?;
    Ok(fingerprint_str(&text))
}

/// Fingerprint an already serialized string
#[must_use]
pub fn fingerprint_str(text: &str) -> String {
    let hash = text.encode_utf16().fold(0i32, |acc, unit| {
        acc.wrapping_shl(5)
            .wrapping_sub(acc)
            .wrapping_add(i32::from(unit))
    });
    to_base36(i64::from(hash).unsigned_abs())
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        // n % 36 < 36
        digits.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

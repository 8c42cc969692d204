//! Store key layout.
//!
//! Provider ids contain `/` and `:` which are not safe in file names. Every
//! byte outside `[A-Za-z0-9_-]` is percent-escaped, so the mapping is
//! injective and the result is safe on any filesystem.

pub const CIRCUIT_PREFIX: &str = "circuit-breaker-";
pub const RATE_LIMIT_PREFIX: &str = "rate-limit-";
pub const RELIABILITY_KEY: &str = "provider-reliability";

/// Percent-escape a provider id.
pub fn escape(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

pub fn circuit_key(id: &str) -> String {
    format!("{}{}", CIRCUIT_PREFIX, escape(id))
}

pub fn rate_limit_key(id: &str) -> String {
    format!("{}{}", RATE_LIMIT_PREFIX, escape(id))
}

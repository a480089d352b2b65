//! Privacy utilities
//!
//! Fingerprinting and display masking for raw device identifiers.
//! Raw MAC/IP values never leave this boundary unhashed or unmasked.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Create a stable, privacy-safe device fingerprint from a MAC address.
///
/// Uses HMAC-SHA256 with a server-held secret so the key is deterministic
/// for the same MAC (in any separator style or case) but cannot be reversed
/// without the secret.
pub fn device_fingerprint(mac: &str, secret: &str) -> String {
    let normalised = normalise_mac(mac);
    let mut engine =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    engine.update(normalised.as_bytes());
    hex::encode(engine.finalize().into_bytes())
}

/// Mask the last 3 octets of a MAC address.
///
/// `AA:BB:CC:DD:EE:FF` becomes `AA:BB:CC:**:**:**`. Malformed input yields
/// the all-placeholder form instead of an error.
pub fn mask_mac(mac: &str) -> String {
    let normalised = normalise_mac(mac);
    let parts: Vec<&str> = normalised.split(':').collect();
    if parts.len() != 6 {
        return "**:**:**:**:**:**".to_string();
    }
    format!("{}:{}:{}:**:**:**", parts[0], parts[1], parts[2])
}

/// Mask the last octet of a dotted-quad IP address.
///
/// `192.168.1.42` becomes `192.168.1.***`. Malformed input yields the
/// all-placeholder form instead of an error.
pub fn mask_ip(ip: &str) -> String {
    let parts: Vec<&str> = ip.split('.').collect();
    if parts.len() != 4 {
        return "***.***.***.***".to_string();
    }
    format!("{}.{}.{}.***", parts[0], parts[1], parts[2])
}

/// First 16 hex chars of SHA-256, used to build alert dedup keys.
pub fn short_hash(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(&digest[..8])
}

/// Normalise a MAC to upper-case colon-separated form.
///
/// Strips every non-hex character first. Inputs that do not contain exactly
/// 12 hex digits are returned upper-cased as-is so fingerprinting stays
/// deterministic while masking degrades to placeholders.
fn normalise_mac(mac: &str) -> String {
    let cleaned: String = mac.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    if cleaned.len() != 12 {
        return mac.to_uppercase();
    }
    cleaned
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).to_uppercase())
        .collect::<Vec<_>>()
        .join(":")
}

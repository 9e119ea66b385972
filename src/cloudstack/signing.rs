//! Request signing for the CloudStack API.
//!
//! The signature is computed over the query string with parameters sorted by
//! lower-cased name and the whole string lower-cased, using HMAC-SHA1 keyed
//! with the secret key. The Base64 digest is appended as `signature`.

use std::fmt::Write as _;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::CloudstackError;

/// Builds the signed query string for `params`.
///
/// # Errors
///
/// Returns [`CloudstackError::Configuration`] when the secret key cannot key
/// the HMAC.
pub fn signed_query(params: &[(String, String)], secret_key: &str) -> Result<String, CloudstackError> {
    let query = canonical_query(params);
    let signature = sign(&query.to_lowercase(), secret_key)?;
    Ok(format!("{query}&signature={}", encode_component(&signature)))
}

/// Joins parameters sorted by lower-cased name, values percent-encoded.
pub(crate) fn canonical_query(params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by_key(|(key, _)| key.to_lowercase());
    sorted
        .iter()
        .map(|(key, value)| format!("{key}={}", encode_component(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn sign(payload: &str, secret_key: &str) -> Result<String, CloudstackError> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret_key.as_bytes())
        .map_err(|err| CloudstackError::Configuration(format!("invalid secret key: {err}")))?;
    mac.update(payload.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Percent-encodes a value the way the management server re-encodes it
/// when checking signatures: form encoding with `%20` for spaces.
///
/// Only `*-_.` and alphanumerics pass through, so `~` becomes `%7E`.
pub(crate) fn encode_component(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'*' | b'-' | b'_' | b'.' => {
                encoded.push(char::from(byte));
            }
            other => {
                write!(encoded, "%{other:02X}").ok();
            }
        }
    }
    encoded
}

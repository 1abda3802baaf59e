//! Advisory expiry check for the stored bearer token.
//!
//! The payload is decoded without verifying the signature. This only decides
//! whether it is worth sending the token at all; the backend authorizes
//! every request on its own.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use chrono::{DateTime, Utc};
use serde_json::Value;

const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// `exp` claim of the token payload in Unix seconds, or `None` when the
/// token cannot be decoded.
pub fn token_expiry(token: &str) -> Option<f64> {
    let payload = token.trim().split('.').nth(1)?;
    if payload.is_empty() {
        return None;
    }
    // Accept standard-alphabet payloads as well.
    let normalized: String = payload
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let bytes = PAYLOAD_ENGINE.decode(normalized.as_bytes()).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_f64()
}

/// Undecodable tokens count as expired.
pub fn is_token_valid(token: &str, now: DateTime<Utc>) -> bool {
    match token_expiry(token) {
        Some(exp) => exp * 1000.0 >= now.timestamp_millis() as f64,
        None => false,
    }
}

#[cfg(test)]
pub(crate) fn fake_token(exp: i64) -> String {
    let header = PAYLOAD_ENGINE.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = PAYLOAD_ENGINE.encode(format!(r#"{{"sub":"42","exp":{exp}}}"#));
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

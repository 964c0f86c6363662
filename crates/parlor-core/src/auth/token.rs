//! Structural and expiry checks on bearer tokens.
//!
//! A token is three dot-separated base64url segments whose middle segment is
//! a JSON object with an `exp` claim in epoch seconds. Signatures are the
//! backend's business; the client only needs to know whether a token is
//! worth sending. Every function here is pure and never fails: anything it
//! cannot make sense of is simply not valid.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

/// base64url that accepts both padded and unpadded input.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode the claims segment, or `None` if the token is malformed.
pub fn claims(token: &str) -> Option<serde_json::Map<String, Value>> {
    let parts: Vec<&str> = token.split('.').collect();
    let [header, payload, signature] = parts.as_slice() else {
        return None;
    };
    if header.is_empty() || payload.is_empty() || signature.is_empty() {
        return None;
    }

    let bytes = URL_SAFE_LENIENT.decode(payload).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Expiry claim in epoch seconds. Fractional values are accepted.
fn exp_seconds(token: &str) -> Option<f64> {
    claims(token)?.get("exp")?.as_f64()
}

/// When the token stops being valid.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let exp_ms = (exp_seconds(token)? * 1000.0) as i64;
    Utc.timestamp_millis_opt(exp_ms).single()
}

/// Whether `token` is well formed and unexpired at `now`.
pub fn is_valid_at<T: AsRef<str>>(token: Option<T>, now: DateTime<Utc>) -> bool {
    let Some(token) = token else {
        return false;
    };
    let token = token.as_ref();
    if token.is_empty() {
        return false;
    }
    match exp_seconds(token) {
        Some(exp) => (now.timestamp_millis() as f64) < exp * 1000.0,
        None => false,
    }
}

/// Whether `token` is present, well formed and unexpired right now.
///
/// `None`, the empty string and anything undecodable are all just invalid.
pub fn is_valid<T: AsRef<str>>(token: Option<T>) -> bool {
    is_valid_at(token, Utc::now())
}

/// Valid now, but expiring within `buffer`.
pub fn needs_refresh(token: &str, buffer: Duration) -> bool {
    let now = Utc::now();
    if !is_valid_at(Some(token), now) {
        return false;
    }
    expires_at(token).is_some_and(|exp| exp - now <= buffer)
}

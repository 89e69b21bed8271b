use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value as JsonValue};

use crate::error::Error;

/// Extracts the `sub` claim from an ID token.
///
/// Decodes the payload segment only. The signature is not verified at this
/// layer: the token arrives over the server-to-server TLS channel from the
/// provider's token endpoint, and signature trust is delegated to that
/// exchange.
///
/// # Errors
///
/// Returns [`Error::Callback`] if the token has fewer than two segments, the
/// payload is not a JSON object, or the `sub` claim is missing or empty.
pub fn sub_from_id_token(id_token: &str) -> Result<String, Error> {
    let payload = decode_payload(id_token)?;
    match payload.get("sub") {
        Some(JsonValue::String(sub)) if !sub.is_empty() => Ok(sub.clone()),
        _ => Err(Error::Callback("missing sub claim in ID token".into())),
    }
}

/// Extracts the `nonce` claim from an ID token, if present.
///
/// # Errors
///
/// Returns [`Error::Callback`] if the token is malformed.
pub fn nonce_from_id_token(id_token: &str) -> Result<Option<String>, Error> {
    let payload = decode_payload(id_token)?;
    Ok(payload
        .get("nonce")
        .and_then(JsonValue::as_str)
        .map(str::to_owned))
}

/// Decodes the payload (second) segment of a dot-separated token into a JSON
/// object. Arrays and scalars are rejected.
fn decode_payload(id_token: &str) -> Result<Map<String, JsonValue>, Error> {
    let mut segments = id_token.split('.');
    let payload_b64 = match (segments.next(), segments.next()) {
        (Some(_), Some(payload)) => payload,
        _ => return Err(Error::Callback("invalid ID token format".into())),
    };

    // Tokens are normally unpadded base64url; tolerate padded input.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload_b64.trim_end_matches('='))
        .map_err(|_| Error::Callback("invalid ID token payload".into()))?;

    match serde_json::from_slice::<JsonValue>(&bytes) {
        Ok(JsonValue::Object(map)) => Ok(map),
        _ => Err(Error::Callback("invalid ID token payload".into())),
    }
}

//! Wire Envelope
//!
//! Every structured request/response body crossing the network boundary is
//! the single-key object `{"_encrypt_": "<cipher text>"}`. This module
//! seals JSON values into that shape and opens received bodies.
//!
//! # Compatibility
//!
//! A body without the `_encrypt_` key is treated as plaintext for
//! compatibility (notably the very first unauthenticated exchange). Once a
//! device identifier is known, sealing is mandatory for POST/PUT/PATCH
//! bodies; `open_sealed` enforces that.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared::cipher;
use crate::shared::error::{EngineError, EngineResult};

/// The only key allowed in an enveloped body.
pub const ENVELOPE_FIELD: &str = "_encrypt_";

/// Request header carrying the client's device identifier.
///
/// Required on every backend request except the asset-serving path; part
/// of the wire contract alongside the envelope itself.
pub const DEVICE_ID_HEADER: &str = "x-device-id";

/// Response header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The wire shape of an enveloped body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Layered-cipher text of the JSON payload
    #[serde(rename = "_encrypt_")]
    pub encrypted: String,
}

/// Whether a JSON value is an envelope.
pub fn is_sealed(value: &Value) -> bool {
    value
        .as_object()
        .map(|obj| obj.contains_key(ENVELOPE_FIELD))
        .unwrap_or(false)
}

/// Seal a JSON value into an envelope under the given secret.
pub fn seal(secret: &str, payload: &Value) -> EngineResult<Value> {
    let text = serde_json::to_string(payload)?;
    let encrypted = cipher::encode(secret, &text)?;
    Ok(serde_json::json!({ ENVELOPE_FIELD: encrypted }))
}

/// Open a received body, accepting plaintext for compatibility.
///
/// An enveloped body is decrypted and parsed; anything else is passed
/// through unchanged.
///
/// # Errors
///
/// A decryption fault when the envelope is present but cannot be opened;
/// the payload must then be rejected, never partially used.
pub fn open(secret: &str, body: &Value) -> EngineResult<Value> {
    match body.get(ENVELOPE_FIELD) {
        Some(Value::String(cipher_text)) => {
            let plaintext = cipher::decode(secret, cipher_text)?;
            Ok(serde_json::from_str(&plaintext)?)
        }
        Some(_) => Err(EngineError::decryption("envelope field is not a string")),
        None => Ok(body.clone()),
    }
}

/// Open a received body, requiring the envelope to be present.
pub fn open_sealed(secret: &str, body: &Value) -> EngineResult<Value> {
    if !is_sealed(body) {
        return Err(EngineError::decryption("body is not enveloped"));
    }
    open(secret, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_seal_open_round_trip() {
        let secret = "localhost#device";
        let payload = json!({"version": "1.0.1", "routes": []});
        let sealed = seal(secret, &payload).unwrap();
        assert!(is_sealed(&sealed));
        assert_eq!(open(secret, &sealed).unwrap(), payload);
    }

    #[test]
    fn test_plaintext_passthrough() {
        let body = json!({"message": "plain"});
        assert!(!is_sealed(&body));
        assert_eq!(open("secret", &body).unwrap(), body);
    }

    #[test]
    fn test_open_sealed_rejects_plaintext() {
        let body = json!({"message": "plain"});
        assert!(matches!(
            open_sealed("secret", &body),
            Err(EngineError::Decryption { .. })
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let sealed = seal("secret-a", &json!({"x": 1})).unwrap();
        assert!(matches!(
            open("secret-b", &sealed),
            Err(EngineError::Decryption { .. })
        ));
    }

    #[test]
    fn test_non_string_envelope_field_rejected() {
        let body = json!({"_encrypt_": 42});
        assert!(open("secret", &body).is_err());
    }
}

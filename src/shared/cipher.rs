//! Layered Cipher
//!
//! Deterministic, key-derived, multi-pass symmetric encoding of text
//! payloads. Every body crossing the client/server boundary is wrapped by
//! this layer, keyed by a per-device secret.
//!
//! # Key Schedule
//!
//! The secret is hashed to a 64-character lowercase SHA-256 hex string and
//! four pass keys are derived from it:
//!
//! 1. the hashed key itself
//! 2. the character-reversal of the hashed key
//! 3. the SHA-256 hex of the first half of the hashed key
//! 4. the SHA-256 hex of the second half of the hashed key
//!
//! Encoding applies the four passes in order and base64-encodes the result.
//! Decoding base64-decodes first and applies the inverse passes in reverse
//! order. The per-pass byte transform does not commute across passes, so
//! the order is load-bearing: swapping two passes breaks the round trip.
//!
//! # Integrity
//!
//! The first 8 bytes of the plaintext's SHA-256 digest are prepended before
//! the passes run. Decoding verifies this digest, which is how a mismatched
//! secret or corrupted cipher text is detected and rejected.
//!
//! # Security Note
//!
//! The secret derives from a client-supplied device identifier with no
//! server-held key. This is transport obfuscation, not a cryptographically
//! sound scheme, and callers must not treat it as one.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest, Sha256};

use crate::shared::error::{EngineError, EngineResult};

/// Number of plaintext digest bytes carried for integrity checking.
const DIGEST_LEN: usize = 8;

/// Derive the per-device secret from an origin and a device identifier.
///
/// A `localhost:port` origin normalizes to `localhost` so a dev client and
/// the server it talks to derive the same secret regardless of port.
pub fn device_secret(origin: &str, device_id: &str) -> String {
    let origin = if origin.starts_with("localhost:") {
        "localhost"
    } else {
        origin
    };
    format!("{}#{}", origin, device_id)
}

/// Hash a key string to its lowercase SHA-256 hex form.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Derive the four pass keys from a secret, in encode order.
fn pass_keys(secret: &str) -> [String; 4] {
    let key = hash_key(secret);
    let reversed: String = key.chars().rev().collect();
    let (first_half, second_half) = key.split_at(key.len() / 2);
    [
        key.clone(),
        reversed,
        hash_key(first_half),
        hash_key(second_half),
    ]
}

/// Produce one 32-byte keystream block: `SHA-256(pass_key || counter)`.
fn keystream_block(pass_key: &str, block: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(pass_key.as_bytes());
    hasher.update(block.to_le_bytes());
    hasher.finalize().into()
}

/// Apply one forward pass in place.
///
/// Per byte: XOR with the keystream, then rotate left by a keystream-derived
/// amount. The rotation is what keeps passes from commuting.
fn apply_pass(data: &mut [u8], pass_key: &str) {
    let mut block = keystream_block(pass_key, 0);
    for (i, byte) in data.iter_mut().enumerate() {
        if i > 0 && i % 32 == 0 {
            block = keystream_block(pass_key, (i / 32) as u64);
        }
        let k = block[i % 32];
        let rot = u32::from((k >> 5) & 0b111);
        *byte = (*byte ^ k).rotate_left(rot);
    }
}

/// Apply the inverse of one pass in place.
fn reverse_pass(data: &mut [u8], pass_key: &str) {
    let mut block = keystream_block(pass_key, 0);
    for (i, byte) in data.iter_mut().enumerate() {
        if i > 0 && i % 32 == 0 {
            block = keystream_block(pass_key, (i / 32) as u64);
        }
        let k = block[i % 32];
        let rot = u32::from((k >> 5) & 0b111);
        *byte = byte.rotate_right(rot) ^ k;
    }
}

/// Encode a plaintext under a secret.
///
/// Pure function of its inputs: the same `(secret, plaintext)` pair always
/// yields the same cipher text.
///
/// # Errors
///
/// Returns a decryption fault if the secret is empty; an empty secret has
/// no defined key schedule.
pub fn encode(secret: &str, plaintext: &str) -> EngineResult<String> {
    if secret.is_empty() {
        return Err(EngineError::decryption("secret must not be empty"));
    }

    let digest = Sha256::digest(plaintext.as_bytes());
    let mut data = Vec::with_capacity(DIGEST_LEN + plaintext.len());
    data.extend_from_slice(&digest[..DIGEST_LEN]);
    data.extend_from_slice(plaintext.as_bytes());

    for pass_key in pass_keys(secret).iter() {
        apply_pass(&mut data, pass_key);
    }

    Ok(BASE64.encode(data))
}

/// Decode a cipher text under a secret.
///
/// # Errors
///
/// Returns a decryption fault when the cipher text is malformed, the base64
/// is invalid, or the secret does not match the one used to encode. Callers
/// must treat any failure here as "cannot trust payload" and reject the
/// request or response outright.
pub fn decode(secret: &str, cipher_text: &str) -> EngineResult<String> {
    if secret.is_empty() {
        return Err(EngineError::decryption("secret must not be empty"));
    }

    let mut data = BASE64
        .decode(cipher_text.trim())
        .map_err(|e| EngineError::decryption(format!("invalid base64: {}", e)))?;

    if data.len() < DIGEST_LEN {
        return Err(EngineError::decryption("cipher text too short"));
    }

    let keys = pass_keys(secret);
    for pass_key in keys.iter().rev() {
        reverse_pass(&mut data, pass_key);
    }

    let (carried, plaintext_bytes) = data.split_at(DIGEST_LEN);
    let digest = Sha256::digest(plaintext_bytes);
    if carried != &digest[..DIGEST_LEN] {
        return Err(EngineError::decryption("integrity digest mismatch"));
    }

    String::from_utf8(plaintext_bytes.to_vec())
        .map_err(|_| EngineError::decryption("decoded payload is not valid UTF-8"))
}

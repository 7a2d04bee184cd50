//! HMAC-SHA256 signatures over SSO payloads.
//!
//! The identity provider and this service share a secret. Every payload exchanged between them travels with
//! `sig = hex(HMAC-SHA256(secret, payload))`, where `payload` is the base64 text exactly as it appears on the wire.
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Error)]
#[error("Could not initialise the HMAC signer. {0}")]
pub struct SignatureError(pub String);

fn mac_for(secret: &[u8], payload: &str) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| SignatureError(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(mac)
}

/// Returns the lower-case hex HMAC-SHA256 of `payload`.
pub fn sign_payload(secret: &[u8], payload: &str) -> Result<String, SignatureError> {
    let mac = mac_for(secret, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `signature` (lower-case hex) against the HMAC of `payload`. The digest comparison is constant-time.
///
/// Signatures that are not canonical lower-case hex never match: accepting `A` for `a` would let a flipped case
/// bit through as a valid signature.
pub fn signature_matches(secret: &[u8], payload: &str, signature: &str) -> Result<bool, SignatureError> {
    let expected = mac_for(secret, payload)?.finalize().into_bytes();
    let Some(provided) = decode_signature(signature) else {
        return Ok(false);
    };
    Ok(constant_time_eq(expected.as_slice(), &provided))
}

/// Compares two byte strings in time that depends only on their lengths.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

fn decode_signature(signature: &str) -> Option<Vec<u8>> {
    if !signature.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return None;
    }
    hex::decode(signature).ok()
}

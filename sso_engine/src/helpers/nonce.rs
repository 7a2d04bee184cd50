use rand::{rngs::OsRng, RngCore};

/// Bytes of entropy in every SSO nonce.
pub const NONCE_BYTES: usize = 32;

/// Creates a fresh nonce from the operating system's CSPRNG, rendered as URL-safe base64 without padding. The
/// alphabet never needs percent-encoding, so the nonce survives the round trip through the identity provider
/// unchanged.
pub fn new_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    base64::encode_config(bytes, base64::URL_SAFE_NO_PAD)
}

mod nonce;
mod signature;
mod sso_codec;

pub use nonce::{new_nonce, NONCE_BYTES};
pub use signature::{constant_time_eq, sign_payload, signature_matches, SignatureError};
pub use sso_codec::{decode_payload, decode_query, encode_payload, encode_query, CodecError};

//! The SSO payload codec.
//!
//! A payload is a query string (`key=value&key=value`, keys and values percent-encoded) that is then base64-encoded
//! into a single opaque blob. Decoding follows `decodeURIComponent` semantics: `%XX` escapes are decoded, `+` stays
//! a literal plus sign.
use std::collections::{btree_map::Entry, BTreeMap};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Payload is not valid base64. {0}")]
    InvalidBase64(String),
    #[error("Payload does not decode to UTF-8 text.")]
    InvalidUtf8,
    #[error("Query string contains an invalid percent-encoded sequence. {0}")]
    InvalidPercentEncoding(String),
    #[error("Query string repeats the key '{0}'.")]
    DuplicateKey(String),
}

/// Percent-encodes every key and value and joins the pairs in the order given.
pub fn encode_query(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<String>>()
        .join("&")
}

/// Parses a query string into a map. Empty segments are skipped and a segment without `=` is a key with an empty
/// value. Repeated keys are an error.
pub fn decode_query(query: &str) -> Result<BTreeMap<String, String>, CodecError> {
    let mut fields = BTreeMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = percent_decode(key)?;
        let value = percent_decode(value)?;
        match fields.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            },
            Entry::Occupied(slot) => return Err(CodecError::DuplicateKey(slot.key().clone())),
        }
    }
    Ok(fields)
}

/// `base64(encode_query(pairs))`
pub fn encode_payload(pairs: &[(&str, &str)]) -> String {
    base64::encode(encode_query(pairs))
}

/// Reverses [`encode_payload`]. ASCII whitespace in the base64 text is ignored, since some providers wrap long
/// payloads.
pub fn decode_payload(payload: &str) -> Result<BTreeMap<String, String>, CodecError> {
    let compact = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect::<String>();
    let bytes = base64::decode(compact).map_err(|e| CodecError::InvalidBase64(e.to_string()))?;
    let query = String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
    decode_query(&query)
}

fn percent_decode(s: &str) -> Result<String, CodecError> {
    urlencoding::decode(s).map(|v| v.into_owned()).map_err(|e| CodecError::InvalidPercentEncoding(e.to_string()))
}

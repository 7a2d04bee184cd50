use std::fmt::{self, Display};

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

const SESSION_ID_BYTES: usize = 32;

/// Opaque identifier of a server-side session. This is the value carried (signed) in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh session id from the operating system's CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Accepts only values that look like ids produced by [`SessionId::random`].
    pub fn parse(s: &str) -> Option<Self> {
        let well_formed = s.len() == 2 * SESSION_ID_BYTES && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        well_formed.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

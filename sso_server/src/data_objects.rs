use serde::{Deserialize, Serialize};
use sso_engine::SsoFields;

/// The response to a successful SSO callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoVerifyResponse {
    /// The bearer token for the verified user.
    pub token: String,
    /// Every field the identity provider asserted, including those that are not part of the token.
    pub sso: SsoFields,
}

//! Access tokens.
//!
//! Once the SSO callback has been verified, the server issues an RS256-signed JWT carrying the user's identity.
//! Tokens are valid for seven days and are not refreshed; after that the user goes through SSO again.
//!
//! Only the signing half of the key pair is needed to issue tokens. Anything that needs to check a token (including
//! `/auth/token` on this server) uses the public key.
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    crypto,
    decode,
    encode,
    errors::ErrorKind,
    Algorithm,
    DecodingKey,
    EncodingKey,
    Header,
    Validation,
};
use log::*;
use serde::{Deserialize, Serialize};
use sso_engine::IdentityClaims;

use crate::{config::AuthConfig, errors::AuthError};

pub const ACCESS_TOKEN_LIFETIME: Duration = Duration::days(7);
const KEY_CHECK_MESSAGE: &[u8] = b"sso key pair check";

/// Checks that the configured keys can be loaded and that the verification key is the public half of the signing
/// key. A fixed message is signed and verified; no token is produced.
pub fn verify_key_pair(config: &AuthConfig) -> Result<(), AuthError> {
    let signing_key = EncodingKey::from_rsa_pem(config.jwt_signing_key.reveal().as_bytes())
        .map_err(|e| AuthError::SigningError(format!("Invalid signing key. {e}")))?;
    let verification_key = DecodingKey::from_rsa_pem(config.jwt_verification_key.as_bytes())
        .map_err(|e| AuthError::ValidationError(format!("Invalid verification key. {e}")))?;
    let signature = crypto::sign(KEY_CHECK_MESSAGE, &signing_key, Algorithm::RS256)
        .map_err(|e| AuthError::SigningError(e.to_string()))?;
    match crypto::verify(&signature, KEY_CHECK_MESSAGE, &verification_key, Algorithm::RS256) {
        Ok(true) => Ok(()),
        Ok(false) => Err(AuthError::ValidationError("The verification key does not match the signing key".into())),
        Err(e) => Err(AuthError::ValidationError(e.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtClaims {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub user_full_name: String,
    /// Issued at, seconds since the Unix epoch
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,
}

impl JwtClaims {
    pub fn new(identity: IdentityClaims, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        let IdentityClaims { user_id, user_name, user_email, user_full_name } = identity;
        Self {
            user_id,
            user_name,
            user_email,
            user_full_name,
            iat: issued_at.timestamp(),
            exp: (issued_at + lifetime).timestamp(),
        }
    }

    pub fn identity(&self) -> IdentityClaims {
        IdentityClaims {
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            user_email: self.user_email.clone(),
            user_full_name: self.user_full_name.clone(),
        }
    }
}

pub struct TokenIssuer {
    signing_key: Option<EncodingKey>,
    lifetime: Duration,
}

impl TokenIssuer {
    /// A malformed signing key does not stop the issuer from being built, but every call to
    /// [`TokenIssuer::issue_token`] will fail.
    pub fn new(config: &AuthConfig) -> Self {
        let signing_key = EncodingKey::from_rsa_pem(config.jwt_signing_key.reveal().as_bytes())
            .map_err(|e| error!("🔐️ The JWT signing key could not be loaded. No access tokens can be issued. {e}"))
            .ok();
        Self { signing_key, lifetime: ACCESS_TOKEN_LIFETIME }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Issue a new access token for the given identity.
    /// This method DOES NOT verify that `identity` is legitimate. The SSO callback must have been verified before
    /// calling `issue_token`.
    pub fn issue_token(&self, identity: IdentityClaims) -> Result<String, AuthError> {
        self.issue_token_at(identity, Utc::now())
    }

    pub fn issue_token_at(&self, identity: IdentityClaims, issued_at: DateTime<Utc>) -> Result<String, AuthError> {
        let key = self.signing_key.as_ref().ok_or_else(|| AuthError::SigningError("No valid signing key".into()))?;
        let claims = JwtClaims::new(identity, issued_at, self.lifetime);
        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".into());
        let token = encode(&header, &claims, key).map_err(|e| AuthError::SigningError(e.to_string()))?;
        trace!("🔐️ Issued access token for {}", claims.user_id);
        Ok(token)
    }
}

pub struct TokenVerifier {
    verification_key: Option<DecodingKey>,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let verification_key = DecodingKey::from_rsa_pem(config.jwt_verification_key.as_bytes())
            .map_err(|e| error!("🔐️ The JWT verification key could not be loaded. {e}"))
            .ok();
        Self { verification_key }
    }

    /// Checks the token's signature and expiry, and returns its claims.
    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let key = self
            .verification_key
            .as_ref()
            .ok_or_else(|| AuthError::ValidationError("No valid verification key".into()))?;
        let validation = Validation::new(Algorithm::RS256);
        let data = decode::<JwtClaims>(token, key, &validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::PoorlyFormattedToken(e.to_string())
            },
            _ => AuthError::ValidationError(e.to_string()),
        })?;
        debug!("🔐️ Access token validated for {}", data.claims.user_id);
        Ok(data.claims)
    }
}

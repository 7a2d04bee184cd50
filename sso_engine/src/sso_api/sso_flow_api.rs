use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sso_common::SessionId;

use crate::{
    helpers::{decode_payload, new_nonce, sign_payload, signature_matches},
    CallbackParams,
    IdentityClaims,
    SessionManagement,
    SessionStoreError,
    SsoApiError,
    SsoFields,
    SsoPayload,
    SsoSettings,
    VerifiedSso,
};

/// The outcome of [`SsoApi::open_session`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpenedSession {
    /// The caller presented a live session.
    Existing(SessionId),
    /// A new session was created. The caller must be handed its id (i.e. a cookie must be set).
    Created(SessionId),
}

impl OpenedSession {
    pub fn id(&self) -> &SessionId {
        match self {
            Self::Existing(id) | Self::Created(id) => id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// `SsoApi` drives the SSO handshake against the identity provider.
///
/// ## Initiation
/// [`SsoApi::initiate`] generates a fresh nonce, signs a payload carrying the nonce and this service's return URL,
/// stores the nonce in the caller's session and returns the URL to redirect the user to.
///
/// ## Verification
/// [`SsoApi::verify`] processes the provider's callback. The checks run in a fixed order, and the first failure
/// ends the attempt:
/// 1. the session must hold a nonce. The nonce is removed from the session at this point, so it can be used once
///    whatever the outcome;
/// 2. `sso` and `sig` must each be present exactly once;
/// 3. `sig` must be the HMAC of `sso`, before anything inside `sso` is looked at;
/// 4. `sso` must decode to a query string;
/// 5. the decoded nonce must equal the session nonce;
/// 6. the identity fields must be present.
pub struct SsoApi<B> {
    db: B,
    settings: SsoSettings,
}

impl<B: Debug> Debug for SsoApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SsoApi ({:?}, {:?})", self.db, self.settings)
    }
}

impl<B> SsoApi<B> {
    pub fn new(db: B, settings: SsoSettings) -> Self {
        Self { db, settings }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn settings(&self) -> &SsoSettings {
        &self.settings
    }
}

impl<B> SsoApi<B>
where B: SessionManagement
{
    /// Returns the presented session if it is live. Never creates a session.
    pub async fn resolve_session(&self, presented: Option<SessionId>) -> Result<Option<SessionId>, SsoApiError> {
        let Some(id) = presented else {
            return Ok(None);
        };
        if self.db.session_exists(&id).await? {
            Ok(Some(id))
        } else {
            debug!("🔐️ Session cookie refers to an unknown or expired session");
            Ok(None)
        }
    }

    /// Resolves the session presented by the caller, or starts a new one if there is none, or if it is unknown or
    /// expired.
    pub async fn open_session(&self, presented: Option<SessionId>) -> Result<OpenedSession, SsoApiError> {
        if let Some(id) = self.resolve_session(presented).await? {
            return Ok(OpenedSession::Existing(id));
        }
        let id = SessionId::random();
        let expires_at = Utc::now() + self.settings.session_lifetime;
        self.db.create_session(&id, expires_at).await?;
        trace!("🔐️ New session created");
        Ok(OpenedSession::Created(id))
    }

    /// Starts an SSO attempt for `session` and returns the identity provider URL the user must be redirected to.
    ///
    /// Any earlier outstanding attempt in the same session is abandoned: its nonce is overwritten.
    pub async fn initiate(&self, session: &SessionId) -> Result<String, SsoApiError> {
        let payload = SsoPayload::new(new_nonce(), self.settings.return_url.clone());
        let encoded = payload.encode();
        let sig = sign_payload(self.settings.secret.reveal().as_bytes(), &encoded)
            .map_err(|e| SsoApiError::SigningKey(e.to_string()))?;
        // The nonce must be in the session before the redirect leaves this function
        self.db.set_nonce(session, &payload.nonce).await?;
        debug!("🔐️ SSO attempt initiated");
        Ok(self.settings.provider_redirect(&encoded, &sig))
    }

    /// Verifies the identity provider's callback for `session` and returns the asserted identity.
    pub async fn verify(&self, session: &SessionId, params: &CallbackParams) -> Result<IdentityClaims, SsoApiError> {
        self.verify_callback(session, params).await.map(|v| v.claims)
    }

    /// Like [`SsoApi::verify`], but also returns the complete decoded payload.
    pub async fn verify_callback(
        &self,
        session: &SessionId,
        params: &CallbackParams,
    ) -> Result<VerifiedSso, SsoApiError> {
        let expected_nonce = match self.db.take_nonce(session).await {
            Ok(Some(nonce)) => nonce,
            Ok(None) | Err(SessionStoreError::SessionNotFound) => {
                debug!("🔐️ SSO callback received, but no SSO attempt is pending for this session");
                return Err(SsoApiError::NoPendingNonce);
            },
            Err(e) => return Err(e.into()),
        };
        let sso = params.single("sso")?;
        let sig = params.single("sig")?;
        let valid = signature_matches(self.settings.secret.reveal().as_bytes(), sso, sig)
            .map_err(|e| SsoApiError::SigningKey(e.to_string()))?;
        if !valid {
            warn!("🔐️ SSO callback carried an invalid signature");
            return Err(SsoApiError::InvalidSignature);
        }
        let fields = SsoFields::from(decode_payload(sso)?);
        if fields.get("nonce") != Some(expected_nonce.as_str()) {
            warn!("🔐️ SSO callback nonce does not match the nonce of this session");
            return Err(SsoApiError::NonceMismatch);
        }
        let claims = IdentityClaims::try_from(&fields)?;
        debug!("🔐️ SSO callback verified for user {}", claims.user_id);
        Ok(VerifiedSso { claims, fields })
    }

    /// Removes expired sessions from the backend and returns how many were removed.
    pub async fn expire_sessions(&self) -> Result<u64, SsoApiError> {
        Ok(self.db.remove_expired_sessions(Utc::now()).await?)
    }
}

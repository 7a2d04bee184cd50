use chrono::{DateTime, Utc};
use sso_common::SessionId;

use crate::SessionStoreError;

/// The `SessionManagement` trait defines the behaviour a session backend needs to support the SSO handshake.
///
/// Sessions have a fixed expiry set at creation. Once a session has expired, every method except
/// [`SessionManagement::create_session`] and [`SessionManagement::remove_expired_sessions`] must behave as if the
/// session did not exist, i.e. return [`SessionStoreError::SessionNotFound`] (or `false` for
/// [`SessionManagement::session_exists`]), whether or not the record has been physically removed yet.
#[allow(async_fn_in_trait)]
pub trait SessionManagement {
    /// Creates an empty session (no nonce) that expires at `expires_at`.
    async fn create_session(&self, id: &SessionId, expires_at: DateTime<Utc>) -> Result<(), SessionStoreError>;

    /// Returns true if the session exists and has not expired.
    async fn session_exists(&self, id: &SessionId) -> Result<bool, SessionStoreError>;

    /// Fetches the nonce of the outstanding SSO attempt, if there is one.
    async fn fetch_nonce(&self, id: &SessionId) -> Result<Option<String>, SessionStoreError>;

    /// Stores `nonce` in the session, replacing any previous value. Only one SSO attempt per session can be
    /// outstanding.
    async fn set_nonce(&self, id: &SessionId, nonce: &str) -> Result<(), SessionStoreError>;

    /// Removes the nonce from the session. Clearing a session without a nonce is not an error.
    async fn clear_nonce(&self, id: &SessionId) -> Result<(), SessionStoreError>;

    /// Removes the nonce from the session and returns it.
    ///
    /// The default implementation calls [`SessionManagement::fetch_nonce`] and then
    /// [`SessionManagement::clear_nonce`]. Backends that can read and clear in a single step should override it, so
    /// that two concurrent callbacks can never both observe the same nonce.
    async fn take_nonce(&self, id: &SessionId) -> Result<Option<String>, SessionStoreError> {
        let nonce = self.fetch_nonce(id).await?;
        if nonce.is_some() {
            self.clear_nonce(id).await?;
        }
        Ok(nonce)
    }

    /// Deletes every session that expired at or before `now`, returning how many were removed.
    async fn remove_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, SessionStoreError>;
}

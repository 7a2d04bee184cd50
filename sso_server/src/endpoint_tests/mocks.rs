use chrono::{DateTime, Utc};
use mockall::mock;
use sso_common::SessionId;
use sso_engine::{SessionManagement, SessionStoreError};

mock! {
    pub SessionManager {}
    impl SessionManagement for SessionManager {
        async fn create_session(&self, id: &SessionId, expires_at: DateTime<Utc>) -> Result<(), SessionStoreError>;
        async fn session_exists(&self, id: &SessionId) -> Result<bool, SessionStoreError>;
        async fn fetch_nonce(&self, id: &SessionId) -> Result<Option<String>, SessionStoreError>;
        async fn set_nonce(&self, id: &SessionId, nonce: &str) -> Result<(), SessionStoreError>;
        async fn clear_nonce(&self, id: &SessionId) -> Result<(), SessionStoreError>;
        async fn take_nonce(&self, id: &SessionId) -> Result<Option<String>, SessionStoreError>;
        async fn remove_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, SessionStoreError>;
    }
}

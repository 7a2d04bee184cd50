use thiserror::Error;

use crate::helpers::CodecError;

#[derive(Debug, Clone, Error)]
pub enum SessionStoreError {
    #[error("Session does not exist or has expired")]
    SessionNotFound,
    #[error("Session store error: {0}")]
    BackendError(String),
}

/// Everything that can stop an SSO handshake.
///
/// The variant tells the server *which* check failed so that it can be logged. It is not meant for the client:
/// all verification failures look the same from the outside.
#[derive(Debug, Clone, Error)]
pub enum SsoApiError {
    #[error("No live session is available for this request")]
    SessionUnavailable,
    #[error("The session has no pending SSO nonce")]
    NoPendingNonce,
    #[error("Malformed SSO callback. {0}")]
    MalformedCallback(String),
    #[error("SSO callback signature is invalid")]
    InvalidSignature,
    #[error("SSO callback nonce does not match the session nonce")]
    NonceMismatch,
    #[error("SSO callback is missing identity fields: {0}")]
    MissingIdentityFields(String),
    #[error("Could not sign the SSO payload. {0}")]
    SigningKey(String),
    #[error("Session store error: {0}")]
    BackendError(String),
}

impl From<SessionStoreError> for SsoApiError {
    fn from(e: SessionStoreError) -> Self {
        match e {
            SessionStoreError::SessionNotFound => Self::SessionUnavailable,
            SessionStoreError::BackendError(s) => Self::BackendError(s),
        }
    }
}

impl From<CodecError> for SsoApiError {
    fn from(e: CodecError) -> Self {
        Self::MalformedCallback(e.to_string())
    }
}

use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::{error, warn};
use sso_engine::SsoApiError;
use thiserror::Error;

const GENERIC_SERVER_ERROR: &str = "internal server error";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("session is not supported")]
    SessionNotSupported,
    #[error("unauthorized")]
    Unauthorized,
    #[error("missing user data from sso return request")]
    MissingUserData,
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("Could not issue access token. {0}")]
    TokenSigningError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::SessionNotSupported => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::MissingUserData => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::BAD_REQUEST,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::SigningError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::TokenSigningError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Server-side faults are logged in full, but the client only ever sees a generic message.
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!("💻️ {self}");
            GENERIC_SERVER_ERROR.to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": message }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No bearer token was provided.")]
    MissingToken,
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Could not sign access token. {0}")]
    SigningError(String),
}

/// Verification failures all collapse into the same response, so that a client probing the protocol cannot learn
/// which check failed. The precise reason is only logged.
impl From<SsoApiError> for ServerError {
    fn from(e: SsoApiError) -> Self {
        match e {
            SsoApiError::SessionUnavailable => Self::SessionNotSupported,
            SsoApiError::NoPendingNonce |
            SsoApiError::MalformedCallback(_) |
            SsoApiError::InvalidSignature |
            SsoApiError::NonceMismatch => {
                warn!("🔐️ SSO verification failed. {e}");
                Self::Unauthorized
            },
            SsoApiError::MissingIdentityFields(_) => {
                warn!("🔐️ SSO verification failed. {e}");
                Self::MissingUserData
            },
            SsoApiError::SigningKey(s) => Self::ConfigurationError(s),
            SsoApiError::BackendError(s) => Self::BackendError(s),
        }
    }
}

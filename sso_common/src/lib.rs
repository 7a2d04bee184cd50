//! Small leaf types shared by the SSO engine and the SSO server.
mod secret;
mod session_id;

pub use secret::Secret;
pub use session_id::SessionId;

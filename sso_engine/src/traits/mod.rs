//! # Session storage contracts
//!
//! The SSO handshake spans two HTTP requests: the redirect towards the identity provider and the provider's
//! callback. The only state carried between them is the nonce of the outstanding attempt, kept server-side in the
//! caller's session. [`SessionManagement`] is the typed interface a session backend must provide.
mod session_management;

pub use session_management::SessionManagement;

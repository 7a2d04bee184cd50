//! SSO Engine
//!
//! This library contains the core logic of the Discourse-style Single-Sign-On handshake. It is independent of any
//! web framework.
//!
//! The library is divided into three sections:
//! 1. Session storage ([`mod@traits`] and [`mod@memory`]). The handshake only needs one piece of server-side state
//!    per browser session: the nonce of the outstanding SSO attempt. Backends implement [`SessionManagement`]; an
//!    in-memory backend, [`MemorySessionStore`], ships with the engine.
//! 2. The public API ([`SsoApi`]). [`SsoApi::initiate`] produces the signed redirect towards the identity provider
//!    and [`SsoApi::verify`] checks the provider's callback, returning the asserted [`IdentityClaims`].
//! 3. Encoding and crypto helpers ([`mod@helpers`]): the base64 query-string payload codec, HMAC-SHA256 signatures
//!    with constant-time comparison, and nonce generation.
//!
//! Issuing bearer tokens for verified identities is the server's job; the engine never sees signing keys for
//! tokens.
pub mod helpers;
pub mod memory;
mod sso_api;
pub mod traits;

pub use memory::MemorySessionStore;
pub use sso_api::{
    errors::{SessionStoreError, SsoApiError},
    sso_flow_api::{OpenedSession, SsoApi},
    sso_objects::{
        CallbackParams,
        IdentityClaims,
        SsoFields,
        SsoPayload,
        SsoSettings,
        VerifiedSso,
        DEFAULT_SESSION_LIFETIME,
        PROVIDER_PATH,
        VERIFY_PATH,
    },
};
pub use traits::SessionManagement;

//! # SSO server
//! This module hosts the server code for the SSO gateway. It is responsible for:
//! Handing browsers off to the identity provider (a Discourse forum) with a signed SSO request.
//! Verifying the identity provider's signed callback and issuing an access token for the asserted user.
//! Checking access tokens on behalf of the rest of the application.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/auth/sso`: Starts an SSO attempt and redirects to the identity provider.
//! * `/auth/sso/verify`: The identity provider's callback. Returns an access token and the SSO fields.
//! * `/auth/token`: Validates the bearer token in the `Authorization` header and returns its claims.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod middleware;
pub mod routes;
pub mod server;

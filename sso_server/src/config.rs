//! Server configuration.
//!
//! All configuration comes from environment variables (a `.env` file is honoured, see `main`). The configuration is
//! read once at startup into a [`ServerConfig`], which is then handed to the parts of the server that need it.
//! Missing or invalid required values stop the server from starting.
//!
//! | Variable                      | Required | Description                                                         |
//! |-------------------------------|----------|---------------------------------------------------------------------|
//! | `SSO_HOST`                    | no       | Interface to bind to. Default `127.0.0.1`                           |
//! | `SSO_PORT`                    | no       | Port to bind to. Default `4000`                                     |
//! | `SSO_ENVIRONMENT`             | no       | `production`, `staging`, `development` (default) or `test`          |
//! | `SSO_IDP_URL`                 | yes      | Base URL of the identity provider (the Discourse forum)             |
//! | `SSO_SECRET`                  | yes      | SSO secret shared with the identity provider                        |
//! | `SSO_PUBLIC_URL`              | yes      | Externally reachable base URL of this service                       |
//! | `SSO_JWT_SIGNING_KEY`         | yes      | PEM RSA private key for access tokens                               |
//! | `SSO_JWT_VERIFICATION_KEY`    | yes      | PEM RSA public key matching `SSO_JWT_SIGNING_KEY`                   |
//! | `SSO_SESSION_SECRET`          | yes      | Secret used to sign session cookies. At least 32 bytes              |
//! | `SSO_SESSION_SWEEP_INTERVAL`  | no       | Seconds between sweeps of expired sessions. Default `60`            |
//!
//! PEM values may be given on one line, with `\n` standing in for line breaks.
use std::{env, env::VarError, fmt::Display, str::FromStr, time::Duration};

use log::*;
use sso_common::Secret;
use sso_engine::{SsoSettings, DEFAULT_SESSION_LIFETIME};
use url::Url;

use crate::{
    auth::verify_key_pair,
    errors::ServerError,
    middleware::SessionCookieConfig,
};

const DEFAULT_SSO_HOST: &str = "127.0.0.1";
const DEFAULT_SSO_PORT: u16 = 4000;
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub sso: SsoConfig,
    pub auth: AuthConfig,
    pub session: SessionConfig,
}

impl ServerConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|name| env::var(name))
    }

    /// Builds the configuration from an arbitrary variable lookup. [`ServerConfig::try_from_env`] uses the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where F: Fn(&str) -> Result<String, VarError> {
        let host = lookup("SSO_HOST").ok().unwrap_or_else(|| DEFAULT_SSO_HOST.into());
        let port = optional(&lookup, "SSO_PORT", DEFAULT_SSO_PORT)?;
        let environment = optional(&lookup, "SSO_ENVIRONMENT", Environment::Development)?;
        let sso = SsoConfig::from_lookup(&lookup)?;
        let auth = AuthConfig::from_lookup(&lookup)?;
        let session = SessionConfig::from_lookup(&lookup)?;
        info!("🪛️ Running in {environment} mode");
        Ok(Self { host, port, environment, sso, auth, session })
    }

    /// The settings for the session cookie. The cookie is scoped to the host of the public URL and only marked
    /// `Secure` in production-like environments.
    pub fn session_cookie_config(&self) -> Result<SessionCookieConfig, ServerError> {
        let config = SessionCookieConfig::new(&self.session.secret)?
            .with_secure(self.environment.is_production_like())
            .with_max_age(DEFAULT_SESSION_LIFETIME);
        let config = match self.sso.public_url.host_str() {
            Some(host) => config.with_domain(host),
            None => config,
        };
        Ok(config)
    }
}

fn required<F>(lookup: &F, name: &str) -> Result<String, ServerError>
where F: Fn(&str) -> Result<String, VarError> {
    match lookup(name) {
        Ok(s) if !s.trim().is_empty() => Ok(s),
        Ok(_) => Err(ServerError::ConfigurationError(format!("{name} is set, but empty"))),
        Err(e) => Err(ServerError::ConfigurationError(format!("{e} [{name}]"))),
    }
}

fn optional<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ServerError>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(name) {
        Ok(s) => s
            .trim()
            .parse::<T>()
            .map_err(|e| ServerError::ConfigurationError(format!("Invalid value for {name}: {s}. {e}"))),
        Err(VarError::NotPresent) => {
            debug!("🪛️ {name} is not set. Using the default value, {default}.");
            Ok(default)
        },
        Err(e) => Err(ServerError::ConfigurationError(format!("{e} [{name}]"))),
    }
}

fn required_url<F>(lookup: &F, name: &str) -> Result<Url, ServerError>
where F: Fn(&str) -> Result<String, VarError> {
    let value = required(lookup, name)?;
    let url = Url::parse(value.trim())
        .map_err(|e| ServerError::ConfigurationError(format!("{name} is not a valid URL. {e}")))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ServerError::ConfigurationError(format!("{name} must be an absolute http(s) URL")));
    }
    Ok(url)
}

fn unescape_pem(s: &str) -> String {
    s.trim().replace("\\n", "\n")
}

//-------------------------------------------------  Environment  ------------------------------------------------------
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    Production,
    Staging,
    #[default]
    Development,
    Test,
}

impl Environment {
    /// Production-like environments are served over TLS, so cookies can be marked `Secure`.
    pub fn is_production_like(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            other => Err(format!("Unknown environment '{other}'")),
        }
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Development => "development",
            Self::Test => "test",
        };
        f.write_str(s)
    }
}

//-------------------------------------------------  SsoConfig  --------------------------------------------------------
#[derive(Clone, Debug)]
pub struct SsoConfig {
    /// Base URL of the identity provider, e.g. `https://forum.example.com`.
    pub provider_url: Url,
    /// Externally reachable base URL of this service. The identity provider redirects users back to
    /// `<public_url>/auth/sso/verify`.
    pub public_url: Url,
    pub secret: Secret<String>,
}

impl SsoConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ServerError>
    where F: Fn(&str) -> Result<String, VarError> {
        let provider_url = required_url(lookup, "SSO_IDP_URL")?;
        let public_url = required_url(lookup, "SSO_PUBLIC_URL")?;
        let secret = Secret::new(required(lookup, "SSO_SECRET")?);
        info!("🪛️ SSO identity provider: {provider_url}. Public URL: {public_url}");
        Ok(Self { provider_url, public_url, secret })
    }

    pub fn sso_settings(&self) -> SsoSettings {
        SsoSettings::new(self.provider_url.as_str(), self.public_url.as_str(), self.secret.clone())
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// PEM-encoded RSA private key used to sign access tokens.
    pub jwt_signing_key: Secret<String>,
    /// PEM-encoded RSA public key that verifies access tokens. It must be the public half of `jwt_signing_key`.
    pub jwt_verification_key: String,
}

impl AuthConfig {
    /// Builds the configuration and checks that the two keys belong together.
    pub fn new(signing_key_pem: &str, verification_key_pem: &str) -> Result<Self, ServerError> {
        let config = Self {
            jwt_signing_key: Secret::new(signing_key_pem.to_string()),
            jwt_verification_key: verification_key_pem.to_string(),
        };
        verify_key_pair(&config).map_err(|e| {
            ServerError::ConfigurationError(format!("The JWT keys are not a valid key pair. Check your configuration. {e}"))
        })?;
        Ok(config)
    }

    fn from_lookup<F>(lookup: &F) -> Result<Self, ServerError>
    where F: Fn(&str) -> Result<String, VarError> {
        let sk = unescape_pem(&required(lookup, "SSO_JWT_SIGNING_KEY")?);
        let vk = unescape_pem(&required(lookup, "SSO_JWT_VERIFICATION_KEY")?);
        Self::new(&sk, &vk)
    }
}

//-------------------------------------------------  SessionConfig  ----------------------------------------------------
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Secret from which the session cookie signing key is derived.
    pub secret: Secret<String>,
    /// Time between sweeps of expired sessions.
    pub sweep_interval: Duration,
}

impl SessionConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ServerError>
    where F: Fn(&str) -> Result<String, VarError> {
        let secret = Secret::new(required(lookup, "SSO_SESSION_SECRET")?);
        // Validates the secret length early, rather than when the first worker starts
        SessionCookieConfig::new(&secret)?;
        let sweep_interval =
            optional(lookup, "SSO_SESSION_SWEEP_INTERVAL", DEFAULT_SWEEP_INTERVAL.as_secs())?.max(1);
        Ok(Self { secret, sweep_interval: Duration::from_secs(sweep_interval) })
    }
}

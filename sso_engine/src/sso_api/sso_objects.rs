use std::collections::{BTreeMap, HashMap};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use sso_common::Secret;

use crate::{helpers::encode_payload, SsoApiError};

/// Path of this service's callback endpoint. The identity provider redirects here after authenticating the user.
pub const VERIFY_PATH: &str = "/auth/sso/verify";
/// Path of the SSO endpoint on the identity provider.
pub const PROVIDER_PATH: &str = "/session/sso_provider";
/// Sessions expire this long after creation. The expiry is fixed, not sliding.
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::minutes(30);

const IDENTITY_FIELDS: [&str; 4] = ["external_id", "email", "name", "username"];

//-------------------------------------------------  SsoSettings  ------------------------------------------------------
#[derive(Clone, Debug)]
pub struct SsoSettings {
    /// Base URL of the identity provider, without a trailing slash.
    pub provider_url: String,
    /// Absolute URL of this service's callback endpoint.
    pub return_url: String,
    /// The HMAC secret shared with the identity provider.
    pub secret: Secret<String>,
    pub session_lifetime: Duration,
}

impl SsoSettings {
    /// `public_url` is the externally reachable base URL of this service; the return URL is derived from it.
    pub fn new(provider_url: &str, public_url: &str, secret: Secret<String>) -> Self {
        Self {
            provider_url: provider_url.trim_end_matches('/').to_string(),
            return_url: format!("{}{VERIFY_PATH}", public_url.trim_end_matches('/')),
            secret,
            session_lifetime: DEFAULT_SESSION_LIFETIME,
        }
    }

    pub fn with_session_lifetime(mut self, lifetime: Duration) -> Self {
        self.session_lifetime = lifetime;
        self
    }

    /// `<provider>/session/sso_provider?sso=<urlencoded payload>&sig=<sig>`
    pub fn provider_redirect(&self, payload: &str, sig: &str) -> String {
        format!("{}{PROVIDER_PATH}?sso={}&sig={sig}", self.provider_url, urlencoding::encode(payload))
    }
}

//-------------------------------------------------  SsoPayload  -------------------------------------------------------
/// The payload sent to the identity provider when an SSO attempt starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SsoPayload {
    pub nonce: String,
    pub return_sso_url: String,
}

impl SsoPayload {
    pub fn new(nonce: String, return_sso_url: String) -> Self {
        Self { nonce, return_sso_url }
    }

    /// `base64("nonce=<nonce>&return_sso_url=<urlencoded return url>")`
    pub fn encode(&self) -> String {
        encode_payload(&[("nonce", &self.nonce), ("return_sso_url", &self.return_sso_url)])
    }
}

//-------------------------------------------------  CallbackParams  ---------------------------------------------------
/// The query parameters of the identity provider's callback. Every occurrence of a key is kept, so that repeated
/// parameters can be told apart from single ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
    params: HashMap<String, Vec<String>>,
}

impl CallbackParams {
    /// Parses a raw (`application/x-www-form-urlencoded`) query string.
    pub fn from_query(query: &str) -> Self {
        url::form_urlencoded::parse(query.as_bytes()).into_owned().collect()
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.params.entry(key.into()).or_default().push(value.into());
        self
    }

    /// Returns the value of `key` if it occurs exactly once.
    pub fn single(&self, key: &str) -> Result<&str, SsoApiError> {
        match self.params.get(key).map(Vec::as_slice) {
            Some([value]) => Ok(value.as_str()),
            Some([]) | None => Err(SsoApiError::MalformedCallback(format!("The '{key}' parameter is missing"))),
            Some(_) => Err(SsoApiError::MalformedCallback(format!("The '{key}' parameter occurs more than once"))),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CallbackParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), |params, (k, v)| params.with(k, v))
    }
}

//-------------------------------------------------  SsoFields  --------------------------------------------------------
/// The decoded `sso` payload of a verified callback, including keys this service does not use.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SsoFields(BTreeMap<String, String>);

impl SsoFields {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl From<BTreeMap<String, String>> for SsoFields {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self(fields)
    }
}

//-------------------------------------------------  IdentityClaims  ---------------------------------------------------
/// The identity asserted by the provider, once the callback has been verified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaims {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub user_full_name: String,
}

impl TryFrom<&SsoFields> for IdentityClaims {
    type Error = SsoApiError;

    fn try_from(fields: &SsoFields) -> Result<Self, Self::Error> {
        let missing = IDENTITY_FIELDS.iter().filter(|k| fields.get(k).is_none()).copied().collect::<Vec<&str>>();
        if !missing.is_empty() {
            return Err(SsoApiError::MissingIdentityFields(missing.join(", ")));
        }
        let field = |k: &str| fields.get(k).unwrap_or_default().to_string();
        Ok(Self {
            user_id: field("external_id"),
            user_name: field("username"),
            user_email: field("email"),
            user_full_name: field("name"),
        })
    }
}

/// The result of a successful verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedSso {
    pub claims: IdentityClaims,
    pub fields: SsoFields,
}

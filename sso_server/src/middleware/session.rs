//! Session middleware for Actix Web.
//!
//! Resolves the caller's server-side session from the signed `session` cookie and places a [`SessionSlot`] in the
//! request extensions. A missing or tampered cookie, or one that refers to a session that no longer exists, leaves
//! the slot empty.
//!
//! The middleware never creates sessions itself. Handlers that need one call [`SessionSlot::get_or_create`], and the
//! middleware then sets the cookie for the new session on the response. The cookie is set once and is never
//! refreshed: session expiry is fixed from the moment of creation.
use std::{
    cell::RefCell,
    fmt,
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    cookie::{time, Cookie, CookieJar, Key, SameSite},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorInternalServerError,
    web,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{debug, trace, warn};
use sso_common::{Secret, SessionId};
use sso_engine::{SessionManagement, SsoApi, SsoApiError, DEFAULT_SESSION_LIFETIME};

use crate::errors::ServerError;

pub const SESSION_COOKIE_NAME: &str = "session";
pub const SESSION_COOKIE_PATH: &str = "/auth";
/// `Key::derive_from` needs at least this much key material.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

//-------------------------------------------------  SessionCookieConfig  ----------------------------------------------
#[derive(Clone)]
pub struct SessionCookieConfig {
    key: Key,
    pub name: String,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub max_age: chrono::Duration,
}

impl fmt::Debug for SessionCookieConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookieConfig")
            .field("key", &"****")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("domain", &self.domain)
            .field("secure", &self.secure)
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl SessionCookieConfig {
    pub fn new(secret: &Secret<String>) -> Result<Self, ServerError> {
        let secret = secret.reveal().as_bytes();
        if secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ServerError::ConfigurationError(format!(
                "The session secret must be at least {MIN_SESSION_SECRET_LEN} bytes long"
            )));
        }
        Ok(Self {
            key: Key::derive_from(secret),
            name: SESSION_COOKIE_NAME.into(),
            path: SESSION_COOKIE_PATH.into(),
            domain: None,
            secure: false,
            max_age: DEFAULT_SESSION_LIFETIME,
        })
    }

    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_max_age(mut self, max_age: chrono::Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Returns the session id from the request's session cookie, if the cookie is present and its signature checks
    /// out.
    pub fn read_session_id(&self, req: &ServiceRequest) -> Option<SessionId> {
        let cookie = req.request().cookie(&self.name)?;
        let mut jar = CookieJar::new();
        jar.add_original(cookie);
        let verified = jar.signed(&self.key).get(&self.name);
        if verified.is_none() {
            warn!("🔐️ Session cookie signature is invalid. Ignoring the cookie.");
        }
        SessionId::parse(verified?.value())
    }

    /// Builds the signed cookie that carries `id`.
    pub fn session_cookie(&self, id: &SessionId) -> Option<Cookie<'static>> {
        let mut builder = Cookie::build(self.name.clone(), id.to_string())
            .path(self.path.clone())
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(self.max_age.num_seconds()));
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        let mut jar = CookieJar::new();
        jar.signed_mut(&self.key).add(builder.finish());
        jar.get(&self.name).cloned()
    }
}

//-------------------------------------------------  SessionSlot  ------------------------------------------------------
/// The session of a request that passed through the session middleware.
#[derive(Clone, Debug, Default)]
pub struct SessionSlot {
    current: Option<SessionId>,
    created: Rc<RefCell<Option<SessionId>>>,
}

impl SessionSlot {
    pub fn new(current: Option<SessionId>) -> Self {
        Self { current, created: Rc::default() }
    }

    /// The live session of the request, if there is one.
    pub fn current(&self) -> Option<SessionId> {
        self.current.clone().or_else(|| self.created())
    }

    /// The session created while handling this request, if any.
    pub fn created(&self) -> Option<SessionId> {
        self.created.borrow().clone()
    }

    /// Returns the live session, creating one if the request has none.
    pub async fn get_or_create<B>(&self, api: &SsoApi<B>) -> Result<SessionId, SsoApiError>
    where B: SessionManagement {
        if let Some(id) = self.current() {
            return Ok(id);
        }
        let opened = api.open_session(None).await?;
        let id = opened.id().clone();
        *self.created.borrow_mut() = Some(id.clone());
        Ok(id)
    }
}

//-------------------------------------------------  Middleware  -------------------------------------------------------
pub struct SessionMiddlewareFactory<B> {
    api: web::Data<SsoApi<B>>,
    cookie_config: SessionCookieConfig,
}

impl<B> SessionMiddlewareFactory<B> {
    pub fn new(api: web::Data<SsoApi<B>>, cookie_config: SessionCookieConfig) -> Self {
        SessionMiddlewareFactory { api, cookie_config }
    }
}

impl<S, B, SB> Transform<S, ServiceRequest> for SessionMiddlewareFactory<SB>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    SB: SessionManagement + 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SessionMiddlewareService<S, SB>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddlewareService {
            api: self.api.clone(),
            cookie_config: self.cookie_config.clone(),
            service: Rc::new(service),
        }))
    }
}

pub struct SessionMiddlewareService<S, SB> {
    api: web::Data<SsoApi<SB>>,
    cookie_config: SessionCookieConfig,
    service: Rc<S>,
}

impl<S, B, SB> Service<ServiceRequest> for SessionMiddlewareService<S, SB>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    SB: SessionManagement + 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let api = self.api.clone();
        let cookie_config = self.cookie_config.clone();
        Box::pin(async move {
            let presented = cookie_config.read_session_id(&req);
            let current = api.resolve_session(presented).await.map_err(|e| {
                warn!("🔐️ Could not look up the session for the request. {e}");
                ErrorInternalServerError("internal server error")
            })?;
            trace!("🔐️ Request {} a live session", if current.is_some() { "has" } else { "does not have" });
            let slot = SessionSlot::new(current);
            req.extensions_mut().insert(slot.clone());
            let mut res = service.call(req).await?;
            if let Some(created) = slot.created() {
                let cookie = cookie_config.session_cookie(&created).ok_or_else(|| {
                    warn!("🔐️ Could not build the session cookie");
                    ErrorInternalServerError("internal server error")
                })?;
                res.response_mut().add_cookie(&cookie).map_err(|e| {
                    warn!("🔐️ Could not set the session cookie. {e}");
                    ErrorInternalServerError("internal server error")
                })?;
                debug!("🔐️ Session cookie set");
            }
            Ok(res)
        })
    }
}

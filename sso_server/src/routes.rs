//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Session lookups and token signing are quick, but anything that
//! could wait on I/O must be expressed as a future.
//!
//! The SSO routes rely on the session middleware (see [`crate::middleware::SessionMiddlewareFactory`]) to attach a
//! [`SessionSlot`] to the request. Without it, `/auth/sso` answers 400 and `/auth/sso/verify` answers 403. Only
//! `/auth/sso` creates sessions.
use actix_web::{get, http::header, web, HttpMessage, HttpRequest, HttpResponse, Responder};
use log::*;
use sso_engine::{CallbackParams, SessionManagement, SsoApi};

use crate::{
    auth::{TokenIssuer, TokenVerifier},
    data_objects::SsoVerifyResponse,
    errors::{AuthError, ServerError},
    middleware::SessionSlot,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

fn session_slot(req: &HttpRequest) -> Option<SessionSlot> {
    req.extensions().get::<SessionSlot>().cloned()
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------   SSO  ----------------------------------------------------
route!(sso => Get "/sso" impl SessionManagement);
/// Starts an SSO attempt.
///
/// Responds with a redirect to the identity provider. The provider authenticates the user and sends them back to
/// `/auth/sso/verify` with a signed assertion.
pub async fn sso<B>(req: HttpRequest, api: web::Data<SsoApi<B>>) -> Result<HttpResponse, ServerError>
where B: SessionManagement {
    trace!("💻️ Received SSO request");
    let slot = session_slot(&req).ok_or_else(|| {
        warn!("💻️ SSO was requested, but sessions are not enabled for this route");
        ServerError::SessionNotSupported
    })?;
    let session = slot.get_or_create(&api).await?;
    let redirect = api.initiate(&session).await?;
    Ok(HttpResponse::Found().insert_header((header::LOCATION, redirect)).finish())
}

route!(sso_verify => Get "/sso/verify" impl SessionManagement);
/// The identity provider's callback.
///
/// If the callback checks out, an access token is issued for the asserted identity and returned with the full set
/// of SSO fields. All verification failures give the same 403 response.
pub async fn sso_verify<B>(
    req: HttpRequest,
    api: web::Data<SsoApi<B>>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError>
where
    B: SessionManagement,
{
    trace!("💻️ Received SSO callback");
    let session = session_slot(&req).and_then(|slot| slot.current()).ok_or_else(|| {
        warn!("💻️ SSO callback received, but the request carries no session");
        ServerError::Unauthorized
    })?;
    let params = CallbackParams::from_query(req.query_string());
    let verified = api.verify_callback(&session, &params).await?;
    let user_id = verified.claims.user_id.clone();
    let token = signer.issue_token(verified.claims).map_err(|e| ServerError::TokenSigningError(e.to_string()))?;
    info!("💻️ User {user_id} signed in via SSO");
    Ok(HttpResponse::Ok().json(SsoVerifyResponse { token, sso: verified.fields }))
}

// ----------------------------------------------   Tokens  ----------------------------------------------------
/// Checks the bearer token in the `Authorization` header and returns the claims it carries.
#[get("/auth/token")]
pub async fn check_token(req: HttpRequest, verifier: web::Data<TokenVerifier>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received token check request");
    let value = req.headers().get(header::AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let value = value.to_str().map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    let token = value
        .trim()
        .split_once(' ')
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::PoorlyFormattedToken("Expected 'Authorization: Bearer <token>'".into()))?;
    let claims = verifier.validate(token)?;
    Ok(HttpResponse::Ok().json(claims))
}

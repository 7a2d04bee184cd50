use actix_web::{
    body::MessageBody,
    cookie::Cookie,
    dev::ServiceResponse,
    http::{header, StatusCode},
    test,
    web,
    web::ServiceConfig,
};
use sso_common::Secret;
use sso_engine::{
    helpers::{decode_payload, encode_payload, sign_payload},
    SessionManagement,
    SsoApi,
    SsoSettings,
};
use url::{form_urlencoded, Url};

use crate::{
    auth::{TokenIssuer, TokenVerifier},
    config::AuthConfig,
    middleware::{SessionCookieConfig, SessionMiddlewareFactory, SESSION_COOKIE_NAME},
    routes::{check_token, SsoRoute, SsoVerifyRoute},
};

// Test keys only. DO NOT re-use these keys anywhere.
pub const TEST_SIGNING_KEY: &str = include_str!("keys/test_signing_key.pem");
pub const TEST_VERIFICATION_KEY: &str = include_str!("keys/test_verification_key.pem");
pub const UNRELATED_VERIFICATION_KEY: &str = include_str!("keys/unrelated_verification_key.pem");

pub const TEST_SSO_SECRET: &str = "d836444a9e4084d5b224a60c208dce14";
pub const TEST_SESSION_SECRET: &str = "a session secret that is comfortably longer than 32 bytes";
pub const TEST_IDP_URL: &str = "https://forum.example.com";
pub const TEST_PUBLIC_URL: &str = "https://bookings.example.com";

pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new(TEST_SIGNING_KEY, TEST_VERIFICATION_KEY).expect("Test keys should form a valid key pair")
}

pub fn test_settings() -> SsoSettings {
    SsoSettings::new(TEST_IDP_URL, TEST_PUBLIC_URL, Secret::new(TEST_SSO_SECRET.to_string()))
}

pub fn cookie_config() -> SessionCookieConfig {
    SessionCookieConfig::new(&Secret::new(TEST_SESSION_SECRET.to_string()))
        .expect("Test session secret is long enough")
        .with_domain("bookings.example.com")
}

/// The query string the identity provider would send back, carrying `pairs` in a correctly signed payload.
pub fn provider_callback_query(pairs: &[(&str, &str)]) -> String {
    let sso = encode_payload(pairs);
    let sig = sign_payload(TEST_SSO_SECRET.as_bytes(), &sso).unwrap();
    form_urlencoded::Serializer::new(String::new()).append_pair("sso", &sso).append_pair("sig", &sig).finish()
}

pub fn identity_for(nonce: &str) -> Vec<(&str, &str)> {
    vec![
        ("nonce", nonce),
        ("external_id", "1337"),
        ("email", "alice@example.com"),
        ("name", "Alice Liddell"),
        ("username", "alice"),
    ]
}

/// The SSO routes behind the session middleware, plus the token routes.
pub fn configure_sso<B>(api: web::Data<SsoApi<B>>) -> impl FnOnce(&mut ServiceConfig)
where B: SessionManagement + 'static {
    move |cfg| {
        let config = get_auth_config();
        cfg.app_data(api.clone())
            .app_data(web::Data::new(TokenIssuer::new(&config)))
            .app_data(web::Data::new(TokenVerifier::new(&config)))
            .service(check_token)
            .service(
                web::scope("/auth")
                    .wrap(SessionMiddlewareFactory::new(api, cookie_config()))
                    .service(SsoRoute::<B>::new())
                    .service(SsoVerifyRoute::<B>::new()),
            );
    }
}

/// The SSO routes without the session middleware.
pub fn configure_without_sessions<B>(api: web::Data<SsoApi<B>>) -> impl FnOnce(&mut ServiceConfig)
where B: SessionManagement + 'static {
    move |cfg| {
        cfg.app_data(api)
            .app_data(web::Data::new(TokenIssuer::new(&get_auth_config())))
            .service(web::scope("/auth").service(SsoRoute::<B>::new()).service(SsoVerifyRoute::<B>::new()));
    }
}

pub fn session_cookie<B>(res: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    res.response().cookies().find(|c| c.name() == SESSION_COOKIE_NAME).map(|c| c.into_owned())
}

/// Pulls the nonce out of the redirect towards the identity provider.
pub fn nonce_from_redirect<B>(res: &ServiceResponse<B>) -> String {
    let location = res.headers().get(header::LOCATION).expect("No Location header").to_str().unwrap();
    let url = Url::parse(location).unwrap();
    let sso = url.query_pairs().find(|(k, _)| k == "sso").map(|(_, v)| v.into_owned()).expect("No sso parameter");
    decode_payload(&sso).unwrap().remove("nonce").expect("No nonce in payload")
}

pub async fn status_and_body<B: MessageBody>(res: ServiceResponse<B>) -> (StatusCode, String) {
    let status = res.status();
    let body = test::read_body(res).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}

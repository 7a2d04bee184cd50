use actix_web::{
    cookie::{time, SameSite},
    http::{header, StatusCode},
    test,
    test::TestRequest,
    web,
    App,
};
use chrono::Utc;
use log::*;
use serde_json::Value;
use sso_common::SessionId;
use sso_engine::{MemorySessionStore, SessionStoreError, SsoApi};

use super::{helpers::*, mocks::MockSessionManager};
use crate::{auth::TokenVerifier, data_objects::SsoVerifyResponse};

fn memory_api() -> web::Data<SsoApi<MemorySessionStore>> {
    web::Data::new(SsoApi::new(MemorySessionStore::new(), test_settings()))
}

#[actix_web::test]
async fn sso_redirects_to_the_identity_provider() {
    let _ = env_logger::try_init().ok();
    let api = memory_api();
    let app = test::init_service(App::new().configure(configure_sso(api.clone()))).await;
    let res = test::call_service(&app, TestRequest::get().uri("/auth/sso").to_request()).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    let location = res.headers().get(header::LOCATION).unwrap().to_str().unwrap().to_string();
    assert!(location.starts_with("https://forum.example.com/session/sso_provider?sso="), "was {location}");
    assert!(location.contains("&sig="));
    assert!(session_cookie(&res).is_some(), "A session cookie should have been set");
    assert_eq!(api.db().len(), 1);
    let nonce = nonce_from_redirect(&res);
    assert!(nonce.len() >= 22, "Nonce is too short: {nonce}");
}

#[actix_web::test]
async fn session_cookie_attributes() {
    let api = memory_api();
    let app = test::init_service(App::new().configure(configure_sso(api))).await;
    let res = test::call_service(&app, TestRequest::get().uri("/auth/sso").to_request()).await;
    let cookie = session_cookie(&res).unwrap();
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.path(), Some("/auth"));
    assert_eq!(cookie.domain(), Some("bookings.example.com"));
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    assert_ne!(cookie.secure(), Some(true));
    assert_eq!(cookie.max_age(), Some(time::Duration::minutes(30)));
}

#[actix_web::test]
async fn full_sso_flow() {
    let _ = env_logger::try_init().ok();
    let api = memory_api();
    let app = test::init_service(App::new().configure(configure_sso(api.clone()))).await;

    let res = test::call_service(&app, TestRequest::get().uri("/auth/sso").to_request()).await;
    let cookie = session_cookie(&res).unwrap();
    let nonce = nonce_from_redirect(&res);

    let mut pairs = identity_for(&nonce);
    pairs.push(("avatar_url", "https://forum.example.com/alice.png"));
    let uri = format!("/auth/sso/verify?{}", provider_callback_query(&pairs));
    let req = TestRequest::get().uri(&uri).cookie(cookie.clone()).to_request();
    let res = test::call_service(&app, req).await;
    assert!(session_cookie(&res).is_none(), "The existing session should have been reused");
    let (status, body) = status_and_body(res).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    info!("Response body: {body}");

    let response: SsoVerifyResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(response.sso.get("username"), Some("alice"));
    assert_eq!(response.sso.get("avatar_url"), Some("https://forum.example.com/alice.png"));
    assert_eq!(response.sso.get("nonce"), Some(nonce.as_str()));

    let claims = TokenVerifier::new(&get_auth_config()).validate(&response.token).unwrap();
    assert_eq!(claims.user_id, "1337");
    assert_eq!(claims.user_name, "alice");
    assert_eq!(claims.user_email, "alice@example.com");
    assert_eq!(claims.user_full_name, "Alice Liddell");
    let lifetime = claims.exp - Utc::now().timestamp();
    assert!((7 * 86400 - 60..=7 * 86400).contains(&lifetime), "Token lifetime was {lifetime}s");

    // The token works against /auth/token
    let req = TestRequest::get()
        .uri("/auth/token")
        .insert_header((header::AUTHORIZATION, format!("Bearer {}", response.token)))
        .to_request();
    let (status, body) = status_and_body(test::call_service(&app, req).await).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["userId"], "1337");
    assert_eq!(json["userFullName"], "Alice Liddell");

    // The same callback cannot be used twice
    let req = TestRequest::get().uri(&uri).cookie(cookie).to_request();
    let (status, body) = status_and_body(test::call_service(&app, req).await).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"unauthorized"}"#);
}

#[actix_web::test]
async fn sso_without_session_support() {
    let app = test::init_service(App::new().configure(configure_without_sessions(memory_api()))).await;
    let res = test::call_service(&app, TestRequest::get().uri("/auth/sso").to_request()).await;
    let (status, body) = status_and_body(res).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"session is not supported"}"#);
}

#[actix_web::test]
async fn verify_without_session_support() {
    let app = test::init_service(App::new().configure(configure_without_sessions(memory_api()))).await;
    let uri = format!("/auth/sso/verify?{}", provider_callback_query(&identity_for("abc")));
    let res = test::call_service(&app, TestRequest::get().uri(&uri).to_request()).await;
    let (status, body) = status_and_body(res).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"unauthorized"}"#);
}

#[actix_web::test]
async fn verify_without_prior_sso_request() {
    let api = memory_api();
    let app = test::init_service(App::new().configure(configure_sso(api.clone()))).await;
    let uri = format!("/auth/sso/verify?{}", provider_callback_query(&identity_for("abc")));
    let res = test::call_service(&app, TestRequest::get().uri(&uri).to_request()).await;
    assert!(session_cookie(&res).is_none(), "No session should be created by a callback");
    let (status, body) = status_and_body(res).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"unauthorized"}"#);
    assert!(api.db().is_empty());
}

#[actix_web::test]
async fn only_sso_requests_create_sessions() {
    let api = memory_api();
    let app = test::init_service(App::new().configure(configure_sso(api.clone()))).await;
    for i in 0..10 {
        let uri = format!("/auth/sso/verify?{}", provider_callback_query(&identity_for(&format!("n{i}"))));
        let res = test::call_service(&app, TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let res = test::call_service(&app, TestRequest::get().uri("/auth/unknown").to_request()).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(session_cookie(&res).is_none());
    }
    // A cookie for a session that does not exist is not enough either
    let stray = cookie_config().session_cookie(&SessionId::random()).unwrap();
    let uri = format!("/auth/sso/verify?{}", provider_callback_query(&identity_for("abc")));
    let res = test::call_service(&app, TestRequest::get().uri(&uri).cookie(stray).to_request()).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(api.db().is_empty());

    let res = test::call_service(&app, TestRequest::get().uri("/auth/sso").to_request()).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(api.db().len(), 1);
}

#[actix_web::test]
async fn forged_signature_is_rejected_and_burns_the_nonce() {
    let api = memory_api();
    let app = test::init_service(App::new().configure(configure_sso(api))).await;
    let res = test::call_service(&app, TestRequest::get().uri("/auth/sso").to_request()).await;
    let cookie = session_cookie(&res).unwrap();
    let nonce = nonce_from_redirect(&res);

    let good = provider_callback_query(&identity_for(&nonce));
    let forged = format!("{}&sig={}", good.split("&sig=").next().unwrap(), "ab".repeat(32));
    let req = TestRequest::get().uri(&format!("/auth/sso/verify?{forged}")).cookie(cookie.clone()).to_request();
    let (status, body) = status_and_body(test::call_service(&app, req).await).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"unauthorized"}"#);

    let req = TestRequest::get().uri(&format!("/auth/sso/verify?{good}")).cookie(cookie).to_request();
    let (status, _) = status_and_body(test::call_service(&app, req).await).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn stale_nonce_is_rejected() {
    let api = memory_api();
    let app = test::init_service(App::new().configure(configure_sso(api))).await;
    let res = test::call_service(&app, TestRequest::get().uri("/auth/sso").to_request()).await;
    let cookie = session_cookie(&res).unwrap();
    let first_nonce = nonce_from_redirect(&res);
    // A second attempt in the same session replaces the first
    let req = TestRequest::get().uri("/auth/sso").cookie(cookie.clone()).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FOUND);

    let uri = format!("/auth/sso/verify?{}", provider_callback_query(&identity_for(&first_nonce)));
    let req = TestRequest::get().uri(&uri).cookie(cookie).to_request();
    let (status, _) = status_and_body(test::call_service(&app, req).await).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn missing_user_data() {
    let api = memory_api();
    let app = test::init_service(App::new().configure(configure_sso(api))).await;
    let res = test::call_service(&app, TestRequest::get().uri("/auth/sso").to_request()).await;
    let cookie = session_cookie(&res).unwrap();
    let nonce = nonce_from_redirect(&res);

    let pairs = identity_for(&nonce).into_iter().filter(|(k, _)| *k != "email").collect::<Vec<_>>();
    let uri = format!("/auth/sso/verify?{}", provider_callback_query(&pairs));
    let req = TestRequest::get().uri(&uri).cookie(cookie).to_request();
    let (status, body) = status_and_body(test::call_service(&app, req).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"missing user data from sso return request"}"#);
}

#[actix_web::test]
async fn tampered_cookie_starts_a_new_session() {
    let api = memory_api();
    let app = test::init_service(App::new().configure(configure_sso(api.clone()))).await;
    let res = test::call_service(&app, TestRequest::get().uri("/auth/sso").to_request()).await;
    let mut cookie = session_cookie(&res).unwrap();
    let mut value = cookie.value().to_string();
    let last = if value.ends_with('0') { '1' } else { '0' };
    value.pop();
    value.push(last);
    cookie.set_value(value);

    let req = TestRequest::get().uri("/auth/sso").cookie(cookie.clone()).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    let fresh = session_cookie(&res).expect("A new session cookie should have been set");
    assert_ne!(fresh.value(), cookie.value());
    assert_eq!(api.db().len(), 2);
}

#[actix_web::test]
async fn backend_failures_are_not_leaked() {
    let _ = env_logger::try_init().ok();
    let mut store = MockSessionManager::new();
    store.expect_create_session().returning(|_, _| Ok(()));
    store.expect_set_nonce().returning(|_, _| Err(SessionStoreError::BackendError("disk on fire".into())));
    let api = web::Data::new(SsoApi::new(store, test_settings()));
    let app = test::init_service(App::new().configure(configure_sso(api))).await;
    let res = test::call_service(&app, TestRequest::get().uri("/auth/sso").to_request()).await;
    let (status, body) = status_and_body(res).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, r#"{"error":"internal server error"}"#);
}

#[actix_web::test]
async fn verify_consumes_the_nonce_through_the_backend() {
    let session = SessionId::random();
    let expected = session.clone();
    let mut store = MockSessionManager::new();
    store.expect_session_exists().returning(move |id| Ok(*id == expected));
    store.expect_take_nonce().times(1).returning(|_| Ok(Some("expected-nonce".into())));
    let api = web::Data::new(SsoApi::new(store, test_settings()));
    let app = test::init_service(App::new().configure(configure_sso(api))).await;
    let uri = format!("/auth/sso/verify?{}", provider_callback_query(&identity_for("expected-nonce")));
    let cookie = cookie_config().session_cookie(&session).unwrap();
    let res = test::call_service(&app, TestRequest::get().uri(&uri).cookie(cookie).to_request()).await;
    let (status, body) = status_and_body(res).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
}

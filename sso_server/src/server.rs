use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use sso_engine::{MemorySessionStore, SsoApi};

use crate::{
    auth::{TokenIssuer, TokenVerifier},
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_session_expiry_worker,
    middleware::SessionMiddlewareFactory,
    routes::{check_token, health, SsoRoute, SsoVerifyRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let api = web::Data::new(SsoApi::new(MemorySessionStore::new(), config.sso.sso_settings()));
    let _worker = start_session_expiry_worker(api.clone(), config.session.sweep_interval);
    let srv = create_server_instance(config, api)?;
    srv.await?;
    Ok(())
}

pub fn create_server_instance(
    config: ServerConfig,
    api: web::Data<SsoApi<MemorySessionStore>>,
) -> Result<Server, ServerError> {
    let cookie_config = config.session_cookie_config()?;
    debug!("🪛️ Session cookies: {cookie_config:?}");
    let issuer = web::Data::new(TokenIssuer::new(&config.auth));
    let verifier = web::Data::new(TokenVerifier::new(&config.auth));
    let srv = HttpServer::new(move || {
        // Routes that take part in the SSO handshake, and so need a session
        let sso_scope = web::scope("/auth")
            .wrap(SessionMiddlewareFactory::new(api.clone(), cookie_config.clone()))
            .service(SsoRoute::<MemorySessionStore>::new())
            .service(SsoVerifyRoute::<MemorySessionStore>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sso::access_log"))
            .app_data(api.clone())
            .app_data(issuer.clone())
            .app_data(verifier.clone())
            .service(health)
            // Must be registered before the /auth scope, which would otherwise swallow it
            .service(check_token)
            .service(sso_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

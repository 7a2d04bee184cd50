use std::time::Duration;

use actix_web::web;
use log::*;
use sso_engine::{MemorySessionStore, SsoApi};
use tokio::task::JoinHandle;

/// Starts the session expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_session_expiry_worker(api: web::Data<SsoApi<MemorySessionStore>>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Session expiry worker started. Sweeping every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running session expiry job");
            match api.expire_sessions().await {
                Ok(0) => trace!("🕰️ No sessions expired"),
                Ok(n) => info!("🕰️ {n} sessions expired. {} sessions remain", api.db().len()),
                Err(e) => error!("🕰️ Error running session expiry job: {e}"),
            }
        }
    })
}

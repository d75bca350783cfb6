// SPDX-License-Identifier: Apache-2.0
use actix_web::{web, App, HttpServer};
use std::io;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

use seqgate::config::{AppConfig, ConfigStore};
use seqgate::logging::init_from_env;
use seqgate::proxy::build_client;
use seqgate::routes::{configure, AppState};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_from_env().map_err(io::Error::other)?;

    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        io::Error::other(e)
    })?;

    info!(bind_addr = %config.bind_addr, endpoint = %config.sequence.api_endpoint, "Starting seqgate");
    if config.sequence.api_key().is_none() {
        warn!("No API key configured; submissions will be rejected until one is set");
    }
    if config.admin_token.is_none() {
        info!("No admin token set, admin settings are disabled");
    }

    let state = web::Data::new(AppState {
        store: ConfigStore::new(config.sequence.clone()),
        nonces: config.nonce_issuer(),
    });
    let admin_token = config.admin_token();
    let request_timeout = config.request_timeout();
    let static_dir = config.static_dir.clone();

    HttpServer::new(move || {
        let admin_token = admin_token.clone();
        let static_dir = static_dir.clone();
        App::new()
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .app_data(web::Data::new(build_client(request_timeout)))
            .configure(|cfg| configure(cfg, admin_token, &static_dir))
    })
    .bind(config.bind_addr.as_str())?
    .workers(4)
    .run()
    .await
}

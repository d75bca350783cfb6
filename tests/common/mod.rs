// SPDX-License-Identifier: Apache-2.0
#![allow(dead_code)]

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use serde_json::Value;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use seqgate::config::{ConfigStore, SequenceConfig};
use seqgate::nonce::NonceIssuer;
use seqgate::routes::AppState;

pub const NONCE_SECRET: &[u8] = b"integration-test-nonce-secret";

/// What the fake webhook saw for one call
#[derive(Debug, Clone)]
pub struct Received {
    pub api_key: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct Behaviour {
    status: u16,
    body: String,
    delay: Duration,
    received: Arc<Mutex<Vec<Received>>>,
}

pub struct FakeWebhook {
    pub url: String,
    received: Arc<Mutex<Vec<Received>>>,
}

impl FakeWebhook {
    pub fn calls(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

async fn webhook(req: HttpRequest, body: web::Bytes, behaviour: web::Data<Behaviour>) -> HttpResponse {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    behaviour.received.lock().unwrap().push(Received {
        api_key: header("X-API-Key"),
        content_type: header("Content-Type"),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    if !behaviour.delay.is_zero() {
        tokio::time::sleep(behaviour.delay).await;
    }

    HttpResponse::build(actix_web::http::StatusCode::from_u16(behaviour.status).unwrap())
        .content_type("application/json")
        .body(behaviour.body.clone())
}

/// Start a webhook on an ephemeral port that answers every POST with
/// `status` and `body`, after `delay`.
pub fn spawn_webhook(status: u16, body: &str, delay: Duration) -> FakeWebhook {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let received = Arc::new(Mutex::new(Vec::new()));
    let behaviour = web::Data::new(Behaviour {
        status,
        body: body.to_string(),
        delay,
        received: Arc::clone(&received),
    });

    let server = HttpServer::new(move || {
        App::new()
            .app_data(behaviour.clone())
            .route("/webhook", web::post().to(webhook))
    })
    .listen(listener)
    .expect("Failed to listen")
    .workers(1)
    .disable_signals()
    .run();
    actix_web::rt::spawn(server);

    FakeWebhook {
        url: format!("http://127.0.0.1:{}/webhook", port),
        received,
    }
}

/// URL of a port nothing listens on
pub fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/webhook", port)
}

pub fn sequence_config(endpoint: &str, api_key: Option<&str>) -> SequenceConfig {
    let mut config = SequenceConfig::default();
    config.api_endpoint = endpoint.to_string();
    if let Some(key) = api_key {
        config.set_api_key(key);
    }
    config
}

pub fn app_state(config: SequenceConfig) -> AppState {
    AppState {
        store: ConfigStore::new(config),
        nonces: NonceIssuer::new(NONCE_SECRET, Duration::from_secs(3600)),
    }
}

/// Registers state, client and routes the same way `main` does
macro_rules! init_app {
    ($state:expr, $timeout:expr, $admin_token:expr) => {{
        let state = actix_web::web::Data::new($state);
        let admin_token: Option<std::sync::Arc<str>> = $admin_token;
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(state.clone())
                .app_data(actix_web::web::Data::new(seqgate::proxy::build_client($timeout)))
                .configure(|cfg| seqgate::routes::configure(cfg, admin_token, "static")),
        )
        .await
    }};
}

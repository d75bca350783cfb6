// SPDX-License-Identifier: Apache-2.0
use actix_files::Files;
use actix_web::{
    error::UrlencodedError,
    http::{header::ContentType, StatusCode},
    web, HttpRequest, HttpResponse, Responder, ResponseError,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, instrument, warn};

use crate::config::ConfigStore;
use crate::middleware::AdminGuard;
use crate::nonce::{NonceError, NonceIssuer, SUBMIT_ACTION};
use crate::proxy::{forward_submission, ProxyError};
use crate::render::{escape_html, render_page, FormTarget, ScriptSource, FORM_SCRIPT_PATH};
use crate::settings::{apply_settings, render_settings_page, SettingsForm};

pub const SUBMIT_PATH: &str = "/submit-form";
pub const RELAY_PATH: &str = "/relay";

// Relay bodies carry the whole payload as one form field
const RELAY_FORM_LIMIT: usize = 256 * 1024;

/// State shared by every worker
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: ConfigStore,
    pub nonces: NonceIssuer,
}

/// Failures specific to the relay route; proxy failures pass through
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Unknown action")]
    UnknownAction,

    #[error("Request must be a form submission")]
    BadForm(#[from] UrlencodedError),

    #[error("Invalid security token")]
    BadNonce(#[from] NonceError),

    #[error("Payload must be valid JSON")]
    BadPayload(#[from] serde_json::Error),

    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

impl ResponseError for RelayError {
    fn status_code(&self) -> StatusCode {
        match self {
            RelayError::UnknownAction | RelayError::BadPayload(_) => StatusCode::BAD_REQUEST,
            RelayError::BadForm(e) => e.status_code(),
            RelayError::BadNonce(_) => StatusCode::FORBIDDEN,
            RelayError::Proxy(e) => e.status_code(),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "data": { "message": self.to_string() },
        }))
    }
}

// Form extractor failures get the relay envelope, not actix's plain text
fn relay_form_error(err: UrlencodedError, _req: &HttpRequest) -> actix_web::Error {
    warn!(error = %err, "Rejected relay body");
    RelayError::BadForm(err).into()
}

#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub security: String,
    #[serde(default)]
    pub payload: String,
}

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "preferredTime")]
    pub preferred_time: Option<String>,
    pub timezone: Option<String>,
}

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json("seqgate is running")
}

/// Signup page wired to the relay with a fresh nonce
#[instrument(skip(state))]
async fn form_page(state: web::Data<AppState>) -> HttpResponse {
    let config = state.store.snapshot();

    let nonce = match state.nonces.issue(SUBMIT_ACTION) {
        Ok(nonce) => nonce,
        Err(e) => {
            error!(error = %e, "Failed to issue form nonce");
            return HttpResponse::InternalServerError().finish();
        }
    };
    let target = FormTarget::Relay {
        url: RELAY_PATH.to_string(),
        nonce,
    };

    match render_page(&config, &target, &ScriptSource::Url(FORM_SCRIPT_PATH.to_string())) {
        Ok(html) => HttpResponse::Ok().content_type(ContentType::html()).body(html),
        Err(e) => {
            error!(error = %e, "Failed to render form page");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Landing page after a successful signup
async fn success_page(query: web::Query<SuccessQuery>) -> HttpResponse {
    let name = query.first_name.as_deref().unwrap_or("there");
    let schedule = match (&query.preferred_time, &query.timezone) {
        (Some(time), Some(tz)) => format!(
            "<p>Your first email arrives at {} ({}).</p>",
            escape_html(time),
            escape_html(tz)
        ),
        _ => String::new(),
    };

    HttpResponse::Ok().content_type(ContentType::html()).body(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>You're signed up</title></head>\n\
         <body>\n    <h1>Thanks, {}!</h1>\n    {}\n</body>\n</html>\n",
        escape_html(name),
        schedule
    ))
}

/// REST entry point: the request body is the payload
#[instrument(skip(client, state, body), fields(body_len = body.len()))]
async fn submit_form(
    client: web::Data<awc::Client>,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> HttpResponse {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Rejected submission with a non-JSON body");
            return HttpResponse::BadRequest().json(json!({
                "code": "invalid_json",
                "error": "Request body must be valid JSON",
            }));
        }
    };

    let config = state.store.snapshot();
    match forward_submission(&client, &config, &payload).await {
        Ok(data) => HttpResponse::Ok().json(data),
        Err(e) => e.error_response(),
    }
}

/// Relay entry point: form-encoded `action`, `security` and `payload`.
/// The nonce is checked before anything is parsed or forwarded.
#[instrument(skip(client, state, form), fields(action = %form.action))]
async fn relay(
    client: web::Data<awc::Client>,
    state: web::Data<AppState>,
    form: web::Form<RelayRequest>,
) -> Result<HttpResponse, RelayError> {
    let form = form.into_inner();
    if form.action != SUBMIT_ACTION {
        warn!("Relay request for unknown action");
        return Err(RelayError::UnknownAction);
    }

    state.nonces.verify(SUBMIT_ACTION, &form.security).map_err(|e| {
        warn!(error = %e, "Relay request failed nonce check");
        RelayError::from(e)
    })?;

    let payload: Value = serde_json::from_str(&form.payload).map_err(|e| {
        warn!(error = %e, "Relay payload is not JSON");
        RelayError::from(e)
    })?;

    let config = state.store.snapshot();
    let data = forward_submission(&client, &config, &payload).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
}

async fn settings_page(state: web::Data<AppState>) -> HttpResponse {
    let config = state.store.snapshot();
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(render_settings_page(&config, &[], false))
}

#[instrument(skip(state, form))]
async fn save_settings(state: web::Data<AppState>, form: web::Form<SettingsForm>) -> HttpResponse {
    let (config, errors) = state.store.update(|config| {
        let errors = apply_settings(config, form.into_inner());
        (config.clone(), errors)
    });

    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(render_settings_page(&config, &errors, true))
}

/// Registers every route. `AppState` and an `awc::Client` must already be
/// in the app data.
pub fn configure(cfg: &mut web::ServiceConfig, admin_token: Option<Arc<str>>, static_dir: &str) {
    cfg.app_data(web::FormConfig::default().limit(RELAY_FORM_LIMIT))
        .service(web::resource("/health").route(web::get().to(health_check)))
        .service(web::resource("/").route(web::get().to(form_page)))
        .service(web::resource("/form").route(web::get().to(form_page)))
        .service(web::resource("/success").route(web::get().to(success_page)))
        .service(web::resource(SUBMIT_PATH).route(web::post().to(submit_form)))
        .service(
            web::resource(RELAY_PATH)
                .app_data(
                    web::FormConfig::default()
                        .limit(RELAY_FORM_LIMIT)
                        .error_handler(relay_form_error),
                )
                .route(web::post().to(relay)),
        )
        .service(
            web::scope("/admin").wrap(AdminGuard::new(admin_token)).service(
                web::resource("/settings")
                    .route(web::get().to(settings_page))
                    .route(web::post().to(save_settings)),
            ),
        )
        .service(Files::new("/static", static_dir));
}

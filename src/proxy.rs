// SPDX-License-Identifier: Apache-2.0
use actix_web::{
    http::{header, StatusCode},
    HttpResponse, ResponseError,
};
use awc::error::PayloadError;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use crate::config::SequenceConfig;

/// Header carrying the webhook API key
pub const API_KEY_HEADER: &str = "X-API-Key";

// Upper bound on webhook response bodies
const MAX_RESPONSE_BODY: usize = 2 * 1024 * 1024;
const FALLBACK_MESSAGE: &str = "Unknown error";

/// Ways forwarding a submission can fail
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("API key is not set")]
    MissingApiKey,

    #[error("Failed to connect to the API")]
    Transport(String),

    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("Invalid response from the API")]
    InvalidResponse(String),
}

impl ProxyError {
    /// Machine-readable code for the error envelope
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::MissingApiKey => "no_api_key",
            _ => "api_error",
        }
    }
}

impl ResponseError for ProxyError {
    fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::MissingApiKey => StatusCode::FORBIDDEN,
            ProxyError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "code": self.code(),
            "error": self.to_string(),
        }))
    }
}

/// Builds the outbound client; one per worker
pub fn build_client(request_timeout: Duration) -> awc::Client {
    let connector = awc::Connector::new()
        .timeout(Duration::from_secs(10).min(request_timeout))
        .conn_keep_alive(Duration::from_secs(15))
        .disconnect_timeout(Duration::from_secs(2));

    awc::ClientBuilder::new()
        .timeout(request_timeout)
        .connector(connector)
        .finish()
}

/// Pull a human-readable message out of an error body
fn upstream_message(body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(detail)) => detail.clone(),
            Some(Value::Null) | None => FALLBACK_MESSAGE.to_string(),
            Some(other) => other.to_string(),
        },
        _ => FALLBACK_MESSAGE.to_string(),
    }
}

/// Forward one submission to the sequence webhook.
///
/// The payload goes out exactly as received. Nothing is sent when the API
/// key is missing. A 200 reply is decoded and handed back untouched; any
/// other status becomes [`ProxyError::Upstream`] with the same status,
/// even when its body can't be read.
#[instrument(skip(client, config, payload), fields(endpoint = %config.api_endpoint, form_id = %config.form_id))]
pub async fn forward_submission(
    client: &awc::Client,
    config: &SequenceConfig,
    payload: &Value,
) -> Result<Value, ProxyError> {
    let Some(api_key) = config.api_key() else {
        error!("API key is not set");
        return Err(ProxyError::MissingApiKey);
    };

    debug!(payload = %payload, "Forwarding submission to webhook");

    let mut response = client
        .post(config.api_endpoint.as_str())
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .insert_header((API_KEY_HEADER, api_key))
        .send_body(payload.to_string())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to connect to the API");
            ProxyError::Transport(e.to_string())
        })?;

    let status = response.status();
    let body = response.body().limit(MAX_RESPONSE_BODY).await;

    if status != StatusCode::OK {
        let message = match &body {
            Ok(body) => {
                error!(status = %status.as_u16(), body = %String::from_utf8_lossy(body), "API error");
                upstream_message(body)
            }
            Err(e) => {
                error!(status = %status.as_u16(), error = %e, "API error, response body unreadable");
                FALLBACK_MESSAGE.to_string()
            }
        };
        return Err(ProxyError::Upstream {
            status: status.as_u16(),
            message,
        });
    }

    let body = body.map_err(|e| {
        error!(error = %e, "Failed to read response body from the API");
        match e {
            PayloadError::Overflow => ProxyError::InvalidResponse(e.to_string()),
            _ => ProxyError::Transport(e.to_string()),
        }
    })?;

    let data = serde_json::from_slice::<Value>(&body).map_err(|e| {
        let body_text = String::from_utf8_lossy(&body);
        error!(error = %e, body = %body_text, "API returned a non-JSON body");
        ProxyError::InvalidResponse(e.to_string())
    })?;

    info!("Submission accepted by webhook");
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn detail_string_becomes_message() {
        assert_eq!(upstream_message(br#"{"detail":"invalid timezone"}"#), "invalid timezone");
    }

    #[test]
    fn structured_detail_is_rendered_as_json() {
        let message = upstream_message(br#"{"detail":[{"loc":["body","timezone"]}]}"#);
        assert_eq!(message, r#"[{"loc":["body","timezone"]}]"#);
    }

    #[test]
    fn missing_or_unparseable_detail_falls_back() {
        assert_eq!(upstream_message(br#"{"error":"nope"}"#), "Unknown error");
        assert_eq!(upstream_message(br#"{"detail":null}"#), "Unknown error");
        assert_eq!(upstream_message(b"<html>502</html>"), "Unknown error");
        assert_eq!(upstream_message(b""), "Unknown error");
    }

    #[test]
    fn error_statuses() {
        assert_eq!(ProxyError::MissingApiKey.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ProxyError::Transport("refused".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::Upstream { status: 422, message: "x".into() }.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ProxyError::Upstream { status: 42, message: "x".into() }.status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[actix_web::test]
    async fn error_envelope_carries_code_and_message() {
        let err = ProxyError::Upstream { status: 422, message: "invalid timezone".into() };
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = to_bytes(response.into_body()).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"code": "api_error", "error": "invalid timezone"}));
    }

    #[actix_web::test]
    async fn missing_key_fails_before_any_connection() {
        // Port 9 on localhost is never contacted; a connect attempt would
        // surface as Transport instead.
        let mut config = SequenceConfig::default();
        config.api_endpoint = "http://127.0.0.1:9/webhook".to_string();
        let client = build_client(Duration::from_secs(1));
        let err = forward_submission(&client, &config, &json!({})).await.unwrap_err();
        assert!(matches!(err, ProxyError::MissingApiKey));
    }
}

// SPDX-License-Identifier: Apache-2.0
use actix_web::{dev::{Service, ServiceRequest, ServiceResponse, Transform}, Error, HttpResponse};
use actix_web::body::EitherBody;
use actix_web::http::header::{self, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::{ok, LocalBoxFuture, Ready};
use serde_json::json;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, instrument, warn};

/// Header the admin token is read from by scripted clients
pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

/// Challenge sent with a 401 so browsers prompt for credentials
pub const ADMIN_CHALLENGE: &str = r#"Basic realm="seqgate admin", charset="UTF-8""#;

/// Guards the admin scope. Without a configured token the scope is hidden.
pub struct AdminGuard {
    token: Option<Arc<str>>,
}

impl AdminGuard {
    pub fn new(token: Option<Arc<str>>) -> Self {
        AdminGuard {
            token: token.filter(|t| !t.is_empty()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AdminGuardService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AdminGuardService {
            service: Rc::new(service),
            token: self.token.clone(),
        })
    }
}

pub struct AdminGuardService<S> {
    service: Rc<S>,
    token: Option<Arc<str>>,
}

// Length still leaks; contents don't.
fn tokens_match(expected: &str, provided: &str) -> bool {
    expected.len() == provided.len()
        && expected
            .bytes()
            .zip(provided.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Password from an `Authorization: Basic` header. The user name is ignored.
fn basic_password(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (_, password) = credentials.split_once(':')?;
    Some(password.to_string())
}

fn is_authorized(expected: &str, headers: &HeaderMap) -> bool {
    let by_header = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|provided| tokens_match(expected, provided));
    by_header || basic_password(headers).is_some_and(|provided| tokens_match(expected, &provided))
}

impl<S, B> Service<ServiceRequest> for AdminGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    #[instrument(name = "admin_guard", skip(self, req), fields(path = %req.path(), method = %req.method()))]
    fn call(&self, req: ServiceRequest) -> Self::Future {
        let Some(expected) = self.token.as_deref() else {
            debug!("Admin surface disabled, no token configured");
            let (request, _) = req.into_parts();
            let response = HttpResponse::NotFound().finish();
            return Box::pin(async move { Ok(ServiceResponse::new(request, response).map_into_right_body()) });
        };

        if is_authorized(expected, req.headers()) {
            let fut = self.service.call(req);
            Box::pin(async move {
                let res = fut.await?;
                Ok(res.map_into_left_body())
            })
        } else {
            warn!("Rejected admin request with missing or wrong token");
            let (request, _) = req.into_parts();
            let response = HttpResponse::Unauthorized()
                .insert_header((header::WWW_AUTHENTICATE, ADMIN_CHALLENGE))
                .json(json!({
                    "code": "unauthorized",
                    "error": "Admin token required",
                }));
            Box::pin(async move { Ok(ServiceResponse::new(request, response).map_into_right_body()) })
        }
    }
}

use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use tracing::debug;

/// Answer 401 in the same `{"error": ...}` shape every handler uses.
fn reject(req: ServiceRequest, reason: &str) -> ServiceResponse<BoxBody> {
    debug!(path = %req.path(), reason, "Rejected unauthenticated request");
    let resp = AppError::Unauthorized(reason.to_string()).error_response();
    req.into_response(resp)
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| AppError::Internal("App config missing".into()))?;

    let header = req
        .headers()
        .get("Authorization")
        .map(|h| h.to_str().map(str::to_string));

    let token = match header {
        None => return Ok(reject(req, "Missing Authorization header")),
        Some(Err(_)) => return Ok(reject(req, "Invalid Authorization header encoding")),
        Some(Ok(value)) => match value.strip_prefix("Bearer ") {
            Some(t) => t.to_string(),
            None => return Ok(reject(req, "Authorization header must start with Bearer")),
        },
    };

    let claims = match verify_token(&token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return Ok(reject(req, "Invalid or expired token")),
    };

    req.extensions_mut().insert(AuthUser::from(claims));

    next.call(req).await
}

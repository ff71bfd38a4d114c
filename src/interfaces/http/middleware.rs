//! Operator authentication middleware
//!
//! Operator routes require `X-API-Key` whose sha256 digest is listed in
//! `security.api_key_hashes`. With no hashes configured the check is off.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use super::common::ApiResponse;
use crate::infrastructure::crypto::ApiKeySet;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone, Default)]
pub struct OperatorAuth {
    pub keys: ApiKeySet,
}

impl OperatorAuth {
    pub fn new(keys: ApiKeySet) -> Self {
        Self { keys }
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::error_with_code(message, "unauthorized")),
    )
        .into_response()
}

pub async fn operator_auth_middleware(
    State(auth): State<OperatorAuth>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !auth.keys.is_enabled() {
        return next.run(request).await;
    }

    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    match presented {
        None | Some("") => unauthorized("Missing X-API-Key header"),
        Some(key) if auth.keys.verify(key) => next.run(request).await,
        Some(_) => {
            warn!(
                method = %request.method(),
                uri = %request.uri(),
                "Rejected operator request with unknown API key"
            );
            unauthorized("Invalid API key")
        }
    }
}

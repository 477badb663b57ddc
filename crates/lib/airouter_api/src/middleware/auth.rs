//! Authentication gate: Bearer token extraction and access-token verification.

use airouter_core::models::auth::TokenClaims;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::error::AppError;

/// Verified claims of the caller, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub TokenClaims);

impl AuthenticatedUser {
    pub fn user_id(&self) -> &str {
        &self.0.sub
    }
}

/// Axum middleware: requires `Authorization: Bearer <access token>` and
/// injects [`AuthenticatedUser`] for downstream handlers.
///
/// Refresh tokens are rejected here even when their signature is valid.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let claims = state.tokens.codec().verify_access(token).map_err(|e| {
        tracing::debug!(error = %e, "access token rejected");
        AppError::Unauthorized("Invalid or expired token".into())
    })?;

    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}

//! Token refresh handler.

use airouter_core::auth::AuthError;
use airouter_core::models::auth::TokenPair;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::routes::REFRESH_TOKEN_HEADER;

/// `POST /api/v1/auth/google/refresh`: exchange the refresh token in
/// `X-Refresh-Token` for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<TokenPair>> {
    let token = headers
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation("Refresh token required".into()))?;

    let pair = state.tokens.refresh(token).await.map_err(refresh_error)?;

    Ok(Json(pair))
}

/// Bad or unknown tokens are the caller's fault; everything else is ours.
fn refresh_error(e: AuthError) -> AppError {
    match e {
        AuthError::TokenInvalid(_) | AuthError::IdentityNotFound(_) => {
            tracing::warn!(error = %e, "refresh rejected");
            AppError::Unauthorized("Invalid refresh token".into())
        }
        other => {
            tracing::error!(error = %other, "refresh failed");
            AppError::from(other)
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use super::*;

    #[test]
    fn rejected_tokens_are_unauthorized() {
        for e in [
            AuthError::TokenInvalid("expired".into()),
            AuthError::IdentityNotFound("u1".into()),
        ] {
            assert_eq!(
                refresh_error(e).into_response().status(),
                StatusCode::UNAUTHORIZED
            );
        }
    }

    #[test]
    fn signing_and_storage_failures_are_server_errors() {
        for e in [
            AuthError::Internal("store offline".into()),
            AuthError::TokenError("signing key rejected".into()),
        ] {
            assert_eq!(
                refresh_error(e).into_response().status(),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }
}

//! Authentication and session token logic.
//!
//! Provides the JWT codec, the identity store abstraction and the token
//! service that ties them together for sign-in and refresh.

pub mod identity;
pub mod jwt;
pub mod queries;
pub mod service;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    TokenInvalid(String),

    #[error("Identity not found: {0}")]
    IdentityNotFound(String),

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

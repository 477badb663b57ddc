//! Authentication domain models.

use serde::{Deserialize, Serialize};

/// Role assigned to users created through the sign-in exchange.
pub const DEFAULT_ROLE: &str = "user";

/// Identity record owned by the external user store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Credential class a token was minted for.
///
/// Signed into every token so an access token can never stand in for a
/// refresh token, or the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims embedded in access and refresh tokens.
///
/// Refresh tokens carry only `sub` and `email`; `name` and `role` are left
/// empty and omitted from the encoded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID).
    pub sub: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    pub kind: TokenKind,
    /// Unique token ID; two tokens minted in the same second still differ.
    pub jti: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Not before (unix timestamp).
    pub nbf: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// Access + refresh token pair returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

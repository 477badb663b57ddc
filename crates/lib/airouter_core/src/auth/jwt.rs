//! JWT token generation and verification.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{TokenClaims, TokenKind, TokenPair, User};

/// Access token lifetime: 15 minutes.
pub const ACCESS_TOKEN_EXPIRY_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 30 days.
pub const REFRESH_TOKEN_EXPIRY_SECS: i64 = 30 * 24 * 60 * 60;

/// Signs and verifies session tokens with a single HS256 secret.
///
/// The secret is fixed at construction; cloning shares the same keys.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Generate a signed access token (HS256, 15 min expiry) carrying the
    /// full identity.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        self.sign(&access_claims(user, Utc::now()))
    }

    /// Generate an access token plus a 30-day refresh token.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let access_token = self.sign(&access_claims(user, now))?;
        let refresh_token = self.sign(&refresh_claims(user, now))?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: ACCESS_TOKEN_EXPIRY_SECS,
        })
    }

    /// Verify signature, algorithm and validity window of any token.
    ///
    /// Purely cryptographic: no store is consulted, so a token stays valid
    /// until it expires.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::TokenInvalid("token cannot be empty".into()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "sub"]);

        decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::TokenInvalid(format!("failed to parse token: {e}")))
    }

    /// Verify a token presented as a bearer credential.
    pub fn verify_access(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.verify_kind(token, TokenKind::Access)
    }

    /// Verify a token presented to the refresh endpoint.
    pub fn verify_refresh(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.verify_kind(token, TokenKind::Refresh)
    }

    fn verify_kind(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, AuthError> {
        let claims = self.verify(token)?;
        if claims.kind != expected {
            return Err(AuthError::TokenInvalid(format!(
                "expected {expected:?} token, got {:?}",
                claims.kind
            )));
        }
        Ok(claims)
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
    }
}

fn access_claims(user: &User, now: DateTime<Utc>) -> TokenClaims {
    TokenClaims {
        sub: user.id.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role.clone(),
        kind: TokenKind::Access,
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        nbf: now.timestamp(),
        exp: (now + Duration::seconds(ACCESS_TOKEN_EXPIRY_SECS)).timestamp(),
    }
}

fn refresh_claims(user: &User, now: DateTime<Utc>) -> TokenClaims {
    TokenClaims {
        sub: user.id.clone(),
        email: user.email.clone(),
        name: String::new(),
        role: String::new(),
        kind: TokenKind::Refresh,
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        nbf: now.timestamp(),
        exp: (now + Duration::seconds(REFRESH_TOKEN_EXPIRY_SECS)).timestamp(),
    }
}

//! Token service: sign-in and refresh flows over the codec and the
//! identity store.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::AuthError;
use super::identity::IdentityStore;
use super::jwt::TokenCodec;
use crate::models::auth::{DEFAULT_ROLE, TokenPair, User};

/// Issues, verifies and rotates session tokens.
#[derive(Clone)]
pub struct TokenService {
    codec: TokenCodec,
    store: Arc<dyn IdentityStore>,
}

impl TokenService {
    pub fn new(codec: TokenCodec, store: Arc<dyn IdentityStore>) -> Self {
        Self { codec, store }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Resolve (or create) the user behind a verified external identity and
    /// issue the session's first token pair.
    ///
    /// Called once the identity provider exchange has produced a verified
    /// email, display name and provider-specific subject ID.
    pub async fn authenticate(
        &self,
        email: &str,
        name: &str,
        external_id: &str,
    ) -> Result<(User, TokenPair), AuthError> {
        let user = match self.store.get_user_by_email(email).await? {
            Some(user) => user,
            None => {
                let user = User {
                    id: external_id.to_string(),
                    name: name.to_string(),
                    email: email.to_string(),
                    role: DEFAULT_ROLE.to_string(),
                };
                self.store.create_user(&user).await?;
                info!(user_id = %user.id, "created user on first sign-in");
                user
            }
        };

        let pair = self.codec.issue_pair(&user)?;
        Ok((user, pair))
    }

    /// Exchange a refresh token for a brand-new token pair.
    ///
    /// The identity is reloaded so role or name changes take effect.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.codec.verify_refresh(refresh_token)?;

        let user = match self.store.get_user(&claims.sub).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AuthError::IdentityNotFound(claims.sub)),
            Err(e) => {
                warn!(user_id = %claims.sub, "identity lookup failed: {e}");
                return Err(AuthError::IdentityNotFound(claims.sub));
            }
        };

        debug!(user_id = %user.id, "rotating token pair");
        self.codec.issue_pair(&user)
    }
}

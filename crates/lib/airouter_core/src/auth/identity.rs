//! Identity store abstraction.
//!
//! The gateway never owns user records; it reads them through
//! [`IdentityStore`]. [`MemoryIdentityStore`] backs tests and local runs,
//! [`super::queries::PgIdentityStore`] backs deployments.

use async_trait::async_trait;
use dashmap::DashMap;

use super::AuthError;
use crate::models::auth::User;

/// Lookup and creation of identity records. Must tolerate concurrent use
/// from many request tasks.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fetch a user by subject ID.
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AuthError>;

    /// Fetch a user by email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Persist a new user.
    async fn create_user(&self, user: &User) -> Result<(), AuthError>;
}

/// In-process identity store keyed by user ID.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    users: DashMap<String, User>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing users.
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let store = Self::new();
        for user in users {
            store.users.insert(user.id.clone(), user);
        }
        store
    }

    /// Remove a user, returning the removed record.
    pub fn remove_user(&self, user_id: &str) -> Option<User> {
        self.users.remove(user_id).map(|(_, user)| user)
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.get(user_id).map(|u| u.value().clone()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.value().email == email)
            .map(|entry| entry.value().clone()))
    }

    async fn create_user(&self, user: &User) -> Result<(), AuthError> {
        if self.users.contains_key(&user.id) {
            return Err(AuthError::Internal(format!("user {} already exists", user.id)));
        }
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }
}

//! PostgreSQL-backed identity store.

use async_trait::async_trait;
use sqlx::PgPool;

use super::AuthError;
use super::identity::IdentityStore;
use crate::models::auth::User;

type UserRow = (String, String, String, String);

fn into_user((id, name, email, role): UserRow) -> User {
    User {
        id,
        name,
        email,
        role,
    }
}

/// Identity store reading the `users` table through a shared pool.
#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, role FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(into_user))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, role FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(into_user))
    }

    async fn create_user(&self, user: &User) -> Result<(), AuthError> {
        sqlx::query("INSERT INTO users (id, name, email, role) VALUES ($1, $2, $3, $4)")
            .bind(&user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.role)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

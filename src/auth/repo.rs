use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::{User, UserRow};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistence port for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Insert a new unverified user; fails with `DuplicateEmail` if the email is taken.
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError>;
    /// Write back every mutable column of `user`.
    async fn update(&self, user: &User) -> Result<(), StoreError>;
    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

const USER_COLUMNS: &str = r#"
    id, email, password_hash, email_verified,
    email_verification_token_hash, email_verification_token_expires_at,
    password_reset_token_hash, password_reset_token_expires_at,
    first_name, last_name, company, position, location, created_at
"#;

/// A unique violation on insert can only come from `users.email`.
pub(crate) fn map_insert_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::DuplicateEmail,
        e => anyhow::Error::new(e).context("insert user").into(),
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(row.map(User::from))
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_insert_error)?;
        Ok(row.into())
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let (verification_hash, verification_expires_at) = match &user.email_verification {
            Some(t) => (Some(t.hash.as_str()), Some(t.expires_at)),
            None => (None, None),
        };
        let (reset_hash, reset_expires_at) = match &user.password_reset {
            Some(t) => (Some(t.hash.as_str()), Some(t.expires_at)),
            None => (None, None),
        };

        sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $2,
                   email_verified = $3,
                   email_verification_token_hash = $4,
                   email_verification_token_expires_at = $5,
                   password_reset_token_hash = $6,
                   password_reset_token_expires_at = $7,
                   first_name = $8,
                   last_name = $9,
                   company = $10,
                   position = $11,
                   location = $12
             WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.password_hash)
        .bind(user.email_verified)
        .bind(verification_hash)
        .bind(verification_expires_at)
        .bind(reset_hash)
        .bind(reset_expires_at)
        .bind(&user.profile.first_name)
        .bind(&user.profile.last_name)
        .bind(&user.profile.company)
        .bind(&user.profile.position)
        .bind(&user.profile.location)
        .execute(&self.db)
        .await
        .context("update user")?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }
}

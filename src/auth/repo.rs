use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};
use crate::db::{unique_as, StoreResult};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    /// Fails with `StoreError::Duplicate("User")` when the email is taken.
    async fn create(&self, new: NewUser) -> StoreResult<User>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool>;
    /// Removes the user together with their profile and posts in one step.
    /// `false` when no such user exists.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
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
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, avatar, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, avatar, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, avatar, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, password_hash, avatar, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.avatar)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db)
        .await
        .map_err(unique_as("User"))?;
        Ok(user)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let res = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        // profiles and posts follow through ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

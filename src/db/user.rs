//! User database operations for authentication

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::model::User;
use crate::auth::repository::UserRepository;

const USER_COLUMNS: &str =
    "id, username, password_hash, display_name, is_admin, refresh_token, created_at, updated_at";

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE refresh_token = $1",
            USER_COLUMNS
        ))
        .bind(refresh_token)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create(
        &self,
        username: &str,
        password_hash: &str,
        display_name: Option<&str>,
        is_admin: bool,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, password_hash, display_name, is_admin)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(username)
        .bind(password_hash)
        .bind(display_name)
        .bind(is_admin)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_refresh_token(
        &self,
        id: &Uuid,
        refresh_token: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET refresh_token = $1, updated_at = NOW() WHERE id = $2")
            .bind(refresh_token)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

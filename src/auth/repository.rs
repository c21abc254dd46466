//! User persistence for the auth gate.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::model::User;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn count(&self) -> Result<i64, sqlx::Error>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error>;

    async fn find_by_refresh_token(&self, refresh_token: &str)
        -> Result<Option<User>, sqlx::Error>;

    async fn create(
        &self,
        username: &str,
        password_hash: &str,
        display_name: Option<&str>,
        is_admin: bool,
    ) -> Result<User, sqlx::Error>;

    /// Store the current refresh token (invalidates any previous session).
    async fn update_refresh_token(&self, id: &Uuid, refresh_token: &str)
        -> Result<(), sqlx::Error>;
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn count(&self) -> Result<i64, sqlx::Error> {
        Ok(self.users.read().len() as i64)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.refresh_token.as_deref() == Some(refresh_token))
            .cloned())
    }

    async fn create(
        &self,
        username: &str,
        password_hash: &str,
        display_name: Option<&str>,
        is_admin: bool,
    ) -> Result<User, sqlx::Error> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            display_name: display_name.map(str::to_string),
            is_admin,
            refresh_token: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.users.write().insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_refresh_token(
        &self,
        id: &Uuid,
        refresh_token: &str,
    ) -> Result<(), sqlx::Error> {
        if let Some(user) = self.users.write().get_mut(id) {
            user.refresh_token = Some(refresh_token.to_string());
            user.updated_at = Some(Utc::now());
        }
        Ok(())
    }
}

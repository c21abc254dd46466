//! Database module - AppState and the PostgreSQL repositories
//!
//! - `template` - Template metadata persistence
//! - `user` - User persistence for the auth gate

mod template;
mod user;

pub use template::PgTemplateRepository;
pub use user::PgUserRepository;

use std::sync::Arc;

use crate::auth::repository::{InMemoryUserRepository, UserRepository};
use crate::config::{AppConfig, ConfigError, StorageBackend};
use crate::storage::{InMemoryStorage, LocalStorage, ObjectStorage};
use crate::template::repository::{InMemoryTemplateRepository, TemplateRepository};
use crate::template::TemplateStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub templates: TemplateStore,
    pub users: Arc<dyn UserRepository>,
}

impl AppState {
    /// Wire the backends selected by `config`.
    pub async fn new_with_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        match config.storage_backend {
            StorageBackend::Memory => {
                log::warn!("STORAGE_BACKEND=memory: templates and users are lost on restart");
                Ok(Self::in_memory(config))
            }
            StorageBackend::Postgres => {
                let database_url = config
                    .database_url
                    .clone()
                    .ok_or(ConfigError::Missing("DATABASE_URL"))?;

                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(20)
                    .min_connections(2)
                    .acquire_timeout(std::time::Duration::from_secs(30))
                    .idle_timeout(std::time::Duration::from_secs(900))
                    .max_lifetime(std::time::Duration::from_secs(1800))
                    .connect(&database_url)
                    .await?;

                sqlx::migrate!("./migrations").run(&pool).await?;
                log::info!("Database migrations applied");

                let storage = Arc::new(LocalStorage::new(config.storage_dir.clone()));
                Ok(Self::with_backends(
                    config,
                    Arc::new(PgTemplateRepository::new(pool.clone())),
                    Arc::new(PgUserRepository::new(pool)),
                    storage,
                ))
            }
        }
    }

    pub fn with_backends(
        config: AppConfig,
        template_repo: Arc<dyn TemplateRepository>,
        users: Arc<dyn UserRepository>,
        storage: Arc<dyn ObjectStorage + Send + Sync>,
    ) -> Self {
        let templates = TemplateStore::new(template_repo, storage, config.max_template_bytes);
        AppState {
            config: Arc::new(config),
            templates,
            users,
        }
    }

    /// Everything in process memory.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::with_backends(
            config,
            Arc::new(InMemoryTemplateRepository::new()),
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryStorage::new()),
        )
    }
}

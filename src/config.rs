//! Application configuration.
//!
//! Built once at startup from the environment (a `.env` file is honoured) and
//! handed to every component that needs it. Nothing reads `std::env` after
//! [`AppConfig::from_env`] returns.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_STORAGE_DIR: &str = "./media";
const DEFAULT_JWT_SECRET: &str = "jurisdoc-jwt-secret-change-in-production";
const DEFAULT_ACCESS_TOKEN_MINUTES: i64 = 60;
const DEFAULT_REFRESH_TOKEN_DAYS: i64 = 1;
const DEFAULT_MAX_TEMPLATE_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Where template metadata and blobs live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// PostgreSQL for metadata, local directory for blobs.
    Postgres,
    /// Everything in process memory; lost on restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(ConfigError::Invalid {
                name: "STORAGE_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub bootstrap_username: String,
    pub bootstrap_password: String,
}

impl AuthConfig {
    pub fn access_token_seconds(&self) -> i64 {
        self.access_token_minutes * 60
    }

    pub fn refresh_token_seconds(&self) -> i64 {
        self.refresh_token_days * 24 * 60 * 60
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            access_token_minutes: DEFAULT_ACCESS_TOKEN_MINUTES,
            refresh_token_days: DEFAULT_REFRESH_TOKEN_DAYS,
            bootstrap_username: "admin".to_string(),
            bootstrap_password: "admin123".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub storage_dir: PathBuf,
    pub max_template_bytes: usize,
    pub cors_origins: Vec<String>,
    pub auth: AuthConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            storage_backend: StorageBackend::Memory,
            database_url: None,
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            max_template_bytes: DEFAULT_MAX_TEMPLATE_BYTES,
            cors_origins: vec!["http://localhost:5173".to_string()],
            auth: AuthConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::Postgres,
        };

        let database_url = env::var("DATABASE_URL").ok();
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            log::warn!("JWT_SECRET not set, using default secret. SET THIS IN PRODUCTION!");
            DEFAULT_JWT_SECRET.to_string()
        });

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.cors_origins);

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            storage_backend,
            database_url,
            storage_dir: env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            max_template_bytes: parse_var("MAX_TEMPLATE_BYTES", defaults.max_template_bytes)?,
            cors_origins,
            auth: AuthConfig {
                jwt_secret,
                access_token_minutes: parse_var(
                    "ACCESS_TOKEN_MINUTES",
                    defaults.auth.access_token_minutes,
                )?,
                refresh_token_days: parse_var(
                    "REFRESH_TOKEN_DAYS",
                    defaults.auth.refresh_token_days,
                )?,
                bootstrap_username: env::var("BOOTSTRAP_ADMIN_USERNAME")
                    .unwrap_or(defaults.auth.bootstrap_username),
                bootstrap_password: env::var("BOOTSTRAP_ADMIN_PASSWORD")
                    .unwrap_or(defaults.auth.bootstrap_password),
            },
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parsing() {
        assert_eq!(
            "postgres".parse::<StorageBackend>().unwrap(),
            StorageBackend::Postgres
        );
        assert_eq!(
            " Memory ".parse::<StorageBackend>().unwrap(),
            StorageBackend::Memory
        );
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_token_lifetimes_in_seconds() {
        let auth = AuthConfig::default();
        assert_eq!(auth.access_token_seconds(), 60 * 60);
        assert_eq!(auth.refresh_token_seconds(), 24 * 60 * 60);
        assert!(auth.refresh_token_seconds() > auth.access_token_seconds());
    }

    #[test]
    fn test_default_upload_limit() {
        assert_eq!(AppConfig::default().max_template_bytes, 50 * 1024 * 1024);
    }
}

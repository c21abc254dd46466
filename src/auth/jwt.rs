use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use super::model::Claims;
use crate::config::AuthConfig;

pub const ACCESS_TOKEN: &str = "access";
pub const REFRESH_TOKEN: &str = "refresh";

fn issue(
    config: &AuthConfig,
    user_id: &str,
    username: &str,
    is_admin: bool,
    token_type: &str,
    lifetime_seconds: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        is_admin,
        exp: now + lifetime_seconds.max(0) as usize,
        iat: now,
        token_type: token_type.to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// Generate access token (short-lived)
pub fn generate_access_token(
    config: &AuthConfig,
    user_id: &str,
    username: &str,
    is_admin: bool,
) -> Result<String, jsonwebtoken::errors::Error> {
    issue(
        config,
        user_id,
        username,
        is_admin,
        ACCESS_TOKEN,
        config.access_token_seconds(),
    )
}

/// Generate refresh token (long-lived)
pub fn generate_refresh_token(
    config: &AuthConfig,
    user_id: &str,
    username: &str,
    is_admin: bool,
) -> Result<String, jsonwebtoken::errors::Error> {
    issue(
        config,
        user_id,
        username,
        is_admin,
        REFRESH_TOKEN,
        config.refresh_token_seconds(),
    )
}

/// Validate and decode a token
pub fn validate_token(
    config: &AuthConfig,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use thiserror::Error;

use super::jwt::{validate_token, ACCESS_TOKEN};
use super::model::Claims;
use crate::config::AuthConfig;
use crate::ErrorResponse;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authorization token")]
    MissingToken,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Invalid token type")]
    WrongTokenType,
    #[error("Admin privileges required")]
    Forbidden,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AuthError::Forbidden => ErrorResponse::forbidden(&self.to_string()),
            _ => ErrorResponse::unauthorized(&self.to_string()),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Extract token from Authorization header
fn extract_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Validate the access token of a request and return its claims
pub fn validate_request_token(req: &HttpRequest, config: &AuthConfig) -> Result<Claims, AuthError> {
    let token = extract_token(req).ok_or(AuthError::MissingToken)?;

    let claims = validate_token(config, &token).map_err(|e| {
        log::warn!("Token validation failed: {:?}", e);
        AuthError::InvalidToken
    })?;

    if claims.token_type != ACCESS_TOKEN {
        return Err(AuthError::WrongTokenType);
    }

    Ok(claims)
}

/// Like [`validate_request_token`], additionally requiring the admin capability.
pub fn require_admin(req: &HttpRequest, config: &AuthConfig) -> Result<Claims, AuthError> {
    let claims = validate_request_token(req, config)?;
    if !claims.is_admin {
        log::warn!("User '{}' attempted an admin action", claims.username);
        return Err(AuthError::Forbidden);
    }
    Ok(claims)
}

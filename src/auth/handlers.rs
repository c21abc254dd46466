use actix_web::{web, HttpRequest, HttpResponse, Responder, ResponseError};
use bcrypt::{hash, verify, DEFAULT_COST};

use super::jwt::{generate_access_token, generate_refresh_token, validate_token, REFRESH_TOKEN};
use super::middleware::{require_admin, validate_request_token};
use super::model::{
    CreateUserRequest, CurrentUser, LoginRequest, RefreshRequest, TokenResponse, UserInfo,
};
use crate::config::AuthConfig;
use crate::{AppState, ErrorResponse};

/// `sub` of tokens issued with the bootstrap credentials.
pub const SETUP_MODE_SUBJECT: &str = "setup-mode";

const MIN_PASSWORD_CHARS: usize = 8;

fn token_pair(
    config: &AuthConfig,
    user_id: &str,
    username: &str,
    is_admin: bool,
    setup_mode: bool,
) -> Result<TokenResponse, HttpResponse> {
    let access_token = generate_access_token(config, user_id, username, is_admin).map_err(|e| {
        log::error!("Failed to generate access token: {:?}", e);
        HttpResponse::InternalServerError()
            .json(ErrorResponse::internal_error("Failed to generate token"))
    })?;
    let refresh_token =
        generate_refresh_token(config, user_id, username, is_admin).map_err(|e| {
            log::error!("Failed to generate refresh token: {:?}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to generate token"))
        })?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: config.access_token_seconds(),
        setup_mode,
    })
}

/// Login endpoint
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> impl Responder {
    let auth = &state.config.auth;
    let user_count = match state.users.count().await {
        Ok(count) => count,
        Err(e) => {
            log::error!("Database error during login: {:?}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Login failed"));
        }
    };

    // First-time setup mode: allow login with bootstrap credentials
    if user_count == 0 {
        if body.username != auth.bootstrap_username || body.password != auth.bootstrap_password {
            return HttpResponse::Unauthorized().json(ErrorResponse::unauthorized(
                "Invalid credentials. Use the bootstrap admin account for first-time setup.",
            ));
        }
        log::warn!("Setup-mode login for '{}'", body.username);
        return match token_pair(auth, SETUP_MODE_SUBJECT, &body.username, true, true) {
            Ok(tokens) => HttpResponse::Ok().json(tokens),
            Err(response) => response,
        };
    }

    let user = match state.users.find_by_username(&body.username).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::Unauthorized()
                .json(ErrorResponse::unauthorized("Invalid username or password"));
        }
        Err(e) => {
            log::error!("Database error during login: {:?}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Login failed"));
        }
    };

    if !verify(&body.password, &user.password_hash).unwrap_or(false) {
        return HttpResponse::Unauthorized()
            .json(ErrorResponse::unauthorized("Invalid username or password"));
    }

    let tokens = match token_pair(auth, &user.id.to_string(), &user.username, user.is_admin, false)
    {
        Ok(tokens) => tokens,
        Err(response) => return response,
    };

    if let Err(e) = state
        .users
        .update_refresh_token(&user.id, &tokens.refresh_token)
        .await
    {
        log::error!("Failed to store refresh token: {:?}", e);
        // Continue anyway, token is still valid
    }

    log::info!("User '{}' logged in", user.username);
    HttpResponse::Ok().json(tokens)
}

/// Refresh access token
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Authentication",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed", body = TokenResponse),
        (status = 401, description = "Invalid refresh token", body = ErrorResponse)
    )
)]
pub async fn refresh_token(
    state: web::Data<AppState>,
    body: web::Json<RefreshRequest>,
) -> impl Responder {
    let auth = &state.config.auth;
    let claims = match validate_token(auth, &body.refresh_token) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Invalid refresh token: {:?}", e);
            return HttpResponse::Unauthorized().json(ErrorResponse::unauthorized(
                "Invalid or expired refresh token",
            ));
        }
    };

    if claims.token_type != REFRESH_TOKEN {
        return HttpResponse::Unauthorized()
            .json(ErrorResponse::unauthorized("Invalid token type"));
    }

    let (user_id, username, is_admin) = if claims.sub == SETUP_MODE_SUBJECT {
        // Setup-mode sessions only last while no user exists.
        match state.users.count().await {
            Ok(0) => (claims.sub, claims.username, true),
            Ok(_) => {
                return HttpResponse::Unauthorized().json(ErrorResponse::unauthorized(
                    "Setup mode has ended. Please login again.",
                ));
            }
            Err(e) => {
                log::error!("Database error during refresh: {:?}", e);
                return HttpResponse::InternalServerError()
                    .json(ErrorResponse::internal_error("Refresh failed"));
            }
        }
    } else {
        // The refresh token must match the stored one (single session per user)
        match state.users.find_by_refresh_token(&body.refresh_token).await {
            Ok(Some(user)) => (user.id.to_string(), user.username, user.is_admin),
            Ok(None) => {
                return HttpResponse::Unauthorized().json(ErrorResponse::unauthorized(
                    "Session expired. Please login again.",
                ));
            }
            Err(e) => {
                log::error!("Database error during refresh: {:?}", e);
                return HttpResponse::InternalServerError()
                    .json(ErrorResponse::internal_error("Refresh failed"));
            }
        }
    };

    let access_token = match generate_access_token(auth, &user_id, &username, is_admin) {
        Ok(t) => t,
        Err(e) => {
            log::error!("Failed to generate access token: {:?}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to generate token"));
        }
    };

    HttpResponse::Ok().json(TokenResponse {
        access_token,
        refresh_token: body.refresh_token.clone(),
        token_type: "Bearer".to_string(),
        expires_in: auth.access_token_seconds(),
        setup_mode: user_id == SETUP_MODE_SUBJECT,
    })
}

/// Current caller
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = CurrentUser),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn me(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    match validate_request_token(&req, &state.config.auth) {
        Ok(claims) => HttpResponse::Ok().json(CurrentUser::from(claims)),
        Err(e) => e.error_response(),
    }
}

/// Create new user (protected - requires admin)
#[utoipa::path(
    post,
    path = "/api/auth/users",
    tag = "Authentication",
    request_body = CreateUserRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "User created", body = UserInfo),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin privileges required", body = ErrorResponse),
        (status = 409, description = "Username already exists", body = ErrorResponse)
    )
)]
pub async fn create_user(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateUserRequest>,
) -> impl Responder {
    let claims = match require_admin(&req, &state.config.auth) {
        Ok(c) => c,
        Err(e) => return e.error_response(),
    };

    let username = body.username.trim();
    if username.is_empty() {
        return HttpResponse::BadRequest()
            .json(ErrorResponse::bad_request("username must not be empty"));
    }
    if body.password.chars().count() < MIN_PASSWORD_CHARS {
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request(&format!(
            "password must be at least {} characters",
            MIN_PASSWORD_CHARS
        )));
    }

    match state.users.find_by_username(username).await {
        Ok(Some(_)) => {
            return HttpResponse::Conflict()
                .json(ErrorResponse::new("Conflict", "Username already exists"));
        }
        Ok(None) => {}
        Err(e) => {
            log::error!("Failed to look up user: {:?}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to create user"));
        }
    }

    let password_hash = match hash(&body.password, DEFAULT_COST) {
        Ok(h) => h,
        Err(e) => {
            log::error!("Failed to hash password: {:?}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to create user"));
        }
    };

    let user = match state
        .users
        .create(
            username,
            &password_hash,
            body.display_name.as_deref(),
            body.is_admin,
        )
        .await
    {
        Ok(user) => user,
        Err(e) => {
            log::error!("Failed to create user: {:?}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to create user"));
        }
    };

    log::info!("User '{}' created by '{}'", user.username, claims.username);
    HttpResponse::Created().json(UserInfo::from(user))
}

/// Configure auth routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh_token))
            .route("/me", web::get().to(me))
            .route("/users", web::post().to(create_user)),
    );
}

use actix_web::{web, HttpRequest, HttpResponse, Responder, ResponseError};

use super::model::GenerationRequest;
use super::service::generate;
use crate::auth::middleware::validate_request_token;
use crate::{AppState, ErrorResponse};

/// Generate a petition from a template
#[utoipa::path(
    post,
    path = "/api/petitions/generate",
    tag = "Petitions",
    request_body = GenerationRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Rendered document",
            content_type = "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            body = Vec<u8>),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 422, description = "Required fields missing", body = ErrorResponse),
        (status = 500, description = "Rendering failed", body = ErrorResponse)
    )
)]
pub async fn generate_petition(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> impl Responder {
    // Authenticate before the body is even parsed.
    let claims = match validate_request_token(&req, &state.config.auth) {
        Ok(c) => c,
        Err(e) => return e.error_response(),
    };

    let request: GenerationRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return HttpResponse::BadRequest().json(ErrorResponse::new(
                "ValidationError",
                &format!("Invalid generation request: {}", e),
            ));
        }
    };

    log::info!(
        "User '{}' generating petition from template {}",
        claims.username,
        request.template_id
    );

    match generate(
        &state.templates,
        request.template_id,
        &request.fields,
        request.filename.as_deref(),
    )
    .await
    {
        Ok(document) => document.into_response(),
        Err(e) => HttpResponse::from(e),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/petitions/generate", web::post().to(generate_petition));
}

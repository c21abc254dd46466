use actix_multipart::Multipart;
use actix_web::web::Path;
use actix_web::{web, HttpRequest, HttpResponse, Responder, ResponseError};
use log::{error, info};
use uuid::Uuid;

use super::model::{Template, TemplateFields, TemplateSummary, UploadTemplateForm};
use super::multipart::MultipartParser;
use crate::auth::middleware::{require_admin, validate_request_token};
use crate::petition::{generate, RenderTemplateRequest};
use crate::{AppState, ErrorResponse};

#[utoipa::path(
    context_path = "/api",
    tag = "Templates",
    post,
    path = "/templates",
    request_body(content = inline(UploadTemplateForm), content_type = "multipart/form-data"),
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Template stored", body = Template),
        (status = 400, description = "Template rejected", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin privileges required", body = ErrorResponse),
        (status = 409, description = "Name already in use", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
pub async fn upload_template(
    req: HttpRequest,
    payload: Multipart,
    data: web::Data<AppState>,
) -> impl Responder {
    let claims = match require_admin(&req, &data.config.auth) {
        Ok(c) => c,
        Err(e) => return e.error_response(),
    };

    let upload =
        match MultipartParser::parse_template_upload(payload, data.templates.max_template_bytes())
            .await
        {
            Ok(upload) => upload,
            Err(e) => {
                error!("Failed to read template upload: {}", e);
                return HttpResponse::from(e);
            }
        };

    info!(
        "Uploading template '{}' ({} bytes)",
        upload.name,
        upload.data.len()
    );
    match data
        .templates
        .create(
            &upload.name,
            upload.filename.as_deref(),
            upload.data,
            &claims,
        )
        .await
    {
        Ok(template) => HttpResponse::Created().json(template),
        Err(e) => HttpResponse::from(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Templates",
    get,
    path = "/templates",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Live templates ordered by name", body = Vec<TemplateSummary>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
pub async fn list_templates(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    if let Err(e) = validate_request_token(&req, &data.config.auth) {
        return e.error_response();
    }

    match data.templates.list().await {
        Ok(templates) => HttpResponse::Ok().json(templates),
        Err(e) => HttpResponse::from(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Templates",
    get,
    path = "/templates/{id}",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Template metadata", body = Template),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "ID of the template")
    )
)]
pub async fn get_template(
    req: HttpRequest,
    id: Path<Uuid>,
    data: web::Data<AppState>,
) -> impl Responder {
    if let Err(e) = validate_request_token(&req, &data.config.auth) {
        return e.error_response();
    }

    match data.templates.get(id.into_inner()).await {
        Ok(template) => HttpResponse::Ok().json(template),
        Err(e) => HttpResponse::from(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Templates",
    get,
    path = "/templates/{id}/fields",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Placeholders the template expects", body = TemplateFields),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "ID of the template")
    )
)]
pub async fn get_template_fields(
    req: HttpRequest,
    id: Path<Uuid>,
    data: web::Data<AppState>,
) -> impl Responder {
    if let Err(e) = validate_request_token(&req, &data.config.auth) {
        return e.error_response();
    }

    match data.templates.fields(id.into_inner()).await {
        Ok(fields) => HttpResponse::Ok().json(fields),
        Err(e) => HttpResponse::from(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Templates",
    delete,
    path = "/templates/{id}",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin privileges required", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "ID of the template to delete")
    )
)]
pub async fn delete_template(
    req: HttpRequest,
    id: Path<Uuid>,
    data: web::Data<AppState>,
) -> impl Responder {
    let claims = match require_admin(&req, &data.config.auth) {
        Ok(c) => c,
        Err(e) => return e.error_response(),
    };

    match data.templates.delete(id.into_inner(), &claims).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => HttpResponse::from(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Templates",
    post,
    path = "/templates/{id}/render",
    request_body = RenderTemplateRequest,
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
    ),
    params(
        ("id" = Uuid, Path, description = "ID of the template to render")
    )
)]
pub async fn render_template(
    req: HttpRequest,
    id: Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Bytes,
) -> impl Responder {
    if let Err(e) = validate_request_token(&req, &data.config.auth) {
        return e.error_response();
    }

    let request: RenderTemplateRequest = if body.is_empty() {
        RenderTemplateRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                return HttpResponse::BadRequest().json(ErrorResponse::new(
                    "ValidationError",
                    &format!("Invalid render request: {}", e),
                ));
            }
        }
    };

    match generate(
        &data.templates,
        id.into_inner(),
        &request.fields,
        request.filename.as_deref(),
    )
    .await
    {
        Ok(document) => document.into_response(),
        Err(e) => HttpResponse::from(e),
    }
}

/// Configure template routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/templates")
            .route(web::get().to(list_templates))
            .route(web::post().to(upload_template)),
    )
    .service(
        web::resource("/templates/{id}")
            .route(web::get().to(get_template))
            .route(web::delete().to(delete_template)),
    )
    .service(web::resource("/templates/{id}/fields").route(web::get().to(get_template_fields)))
    .service(web::resource("/templates/{id}/render").route(web::post().to(render_template)));
}

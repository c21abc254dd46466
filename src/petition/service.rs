//! Petition generation: template lookup -> variable resolution -> rendering.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::model::RenderedDocument;
use crate::generators::common::{sanitize_filename, timestamped_stem};
use crate::generators::{
    DocxRenderEngine, RenderError, ResolveError, VariableResolver, DOCX_CONTENT_TYPE,
};
use crate::template::{TemplateError, TemplateStore};
use crate::ErrorResponse;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("template {0} not found")]
    NotFound(Uuid),
    #[error("missing fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<TemplateError> for GenerationError {
    fn from(error: TemplateError) -> Self {
        match error {
            TemplateError::NotFound(id) => GenerationError::NotFound(id),
            other => GenerationError::Storage(other.to_string()),
        }
    }
}

impl From<ResolveError> for GenerationError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::MissingFields(names) => GenerationError::MissingFields(names),
            ResolveError::UnsupportedValue { name, kind } => {
                GenerationError::Render(RenderError::UnsupportedValue { name, kind })
            }
        }
    }
}

impl From<GenerationError> for HttpResponse {
    fn from(error: GenerationError) -> Self {
        match error {
            GenerationError::NotFound(_) => {
                HttpResponse::NotFound().json(ErrorResponse::not_found(&error.to_string()))
            }
            GenerationError::MissingFields(ref missing) => {
                let details = serde_json::json!({ "missing": missing });
                HttpResponse::UnprocessableEntity().json(
                    ErrorResponse::new("MissingField", &error.to_string()).with_details(details),
                )
            }
            GenerationError::Render(ref e) => {
                log::error!("Rendering failed: {}", e);
                HttpResponse::InternalServerError()
                    .json(ErrorResponse::new("RenderError", &error.to_string()))
            }
            GenerationError::Storage(ref message) => {
                log::error!("Storage failure during generation: {}", message);
                HttpResponse::InternalServerError()
                    .json(ErrorResponse::internal_error("Failed to load template"))
            }
        }
    }
}

/// Download name for a generated petition, always ending in `.docx`.
pub fn output_filename(requested: Option<&str>, template_name: &str) -> String {
    let stem = match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => {
            let cut = name.len().saturating_sub(".docx".len());
            let without_ext = match name.get(cut..) {
                Some(ext) if ext.eq_ignore_ascii_case(".docx") => &name[..cut],
                _ => name,
            };
            sanitize_filename(without_ext, &timestamped_stem(template_name, Utc::now()))
        }
        None => timestamped_stem(template_name, Utc::now()),
    };
    format!("{}.docx", stem)
}

/// Render a petition from a stored template.
///
/// Unknown request fields are ignored; every placeholder the template declares
/// must be satisfied or the call fails without producing a document.
pub async fn generate(
    store: &TemplateStore,
    template_id: Uuid,
    fields: &Map<String, Value>,
    filename: Option<&str>,
) -> Result<RenderedDocument, GenerationError> {
    let template = store.get(template_id).await?;
    let variables = VariableResolver::resolve(&template.placeholder_set(), fields)?;
    let blob = store.load_blob(&template).await?;

    let bytes = web::block(move || DocxRenderEngine::render(&blob, &variables))
        .await
        .map_err(|e| RenderError::Aborted(e.to_string()))??;

    let filename = output_filename(filename, &template.name);
    log::info!(
        "Generated '{}' from template {} ({} bytes)",
        filename,
        template.id,
        bytes.len()
    );

    Ok(RenderedDocument {
        bytes,
        filename,
        content_type: DOCX_CONTENT_TYPE,
    })
}

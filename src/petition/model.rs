use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::HttpResponse;
use serde::Deserialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

/// Body of `POST /petitions/generate`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerationRequest {
    #[schema(example = "f1e2d3c4-b5a6-7890-1234-567890abcdef")]
    pub template_id: Uuid,
    /// Field name -> value. Nested objects are reached by dotted placeholders.
    #[serde(default)]
    #[schema(value_type = Object, example = json!({"client_name": "Maria Silva", "case_number": "123/2024"}))]
    pub fields: Map<String, Value>,
    /// Download name; `.docx` is appended.
    pub filename: Option<String>,
}

/// Body of `POST /templates/{id}/render`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RenderTemplateRequest {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub fields: Map<String, Value>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: &'static str,
}

impl RenderedDocument {
    pub fn into_response(self) -> HttpResponse {
        HttpResponse::Ok()
            .content_type(self.content_type)
            .insert_header(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(self.filename)],
            })
            .body(self.bytes)
    }
}

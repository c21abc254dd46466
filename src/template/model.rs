use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::generators::{DeclaredPlaceholder, PlaceholderSet};

/// A stored `.docx` template. The blob itself lives in object storage.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Template {
    #[schema(example = "f1e2d3c4-b5a6-7890-1234-567890abcdef")]
    pub id: Uuid,
    #[schema(example = "Petição Inicial - Revisional")]
    pub name: String,
    /// `sub` of the admin who uploaded it.
    pub owner: String,
    #[serde(skip)]
    pub blob_key: String,
    #[schema(example = "peticao_inicial.docx")]
    pub original_filename: String,
    pub size_bytes: i64,
    pub placeholders: Vec<DeclaredPlaceholder>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Template {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn placeholder_set(&self) -> PlaceholderSet {
        self.placeholders.iter().cloned().collect()
    }
}

/// Template metadata as returned by the listing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TemplateSummary {
    pub id: Uuid,
    pub name: String,
    pub original_filename: String,
    pub size_bytes: i64,
    pub placeholder_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Template> for TemplateSummary {
    fn from(template: &Template) -> Self {
        Self {
            id: template.id,
            name: template.name.clone(),
            original_filename: template.original_filename.clone(),
            size_bytes: template.size_bytes,
            placeholder_count: template.placeholders.len(),
            created_at: template.created_at,
            updated_at: template.updated_at,
        }
    }
}

/// Placeholders a template expects, with their guessed kinds.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TemplateFields {
    pub template_id: Uuid,
    pub fields: Vec<DeclaredPlaceholder>,
}

/// Everything needed to insert a new template row.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub id: Uuid,
    pub name: String,
    pub owner: String,
    pub blob_key: String,
    pub original_filename: String,
    pub size_bytes: i64,
    pub placeholders: Vec<DeclaredPlaceholder>,
}

impl NewTemplate {
    pub fn into_template(self, now: DateTime<Utc>) -> Template {
        Template {
            id: self.id,
            name: self.name,
            owner: self.owner,
            blob_key: self.blob_key,
            original_filename: self.original_filename,
            size_bytes: self.size_bytes,
            placeholders: self.placeholders,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Multipart upload form, for the OpenAPI document only.
#[derive(ToSchema)]
pub struct UploadTemplateForm {
    #[allow(unused)]
    pub name: String,
    #[allow(unused)]
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

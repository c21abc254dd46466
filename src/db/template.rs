//! Template database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::generators::DeclaredPlaceholder;
use crate::template::model::{NewTemplate, Template};
use crate::template::repository::{RepositoryError, TemplateRepository};

const TEMPLATE_COLUMNS: &str = "id, name, owner, blob_key, original_filename, size_bytes, \
     placeholders, created_at, updated_at, deleted_at";

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    name: String,
    owner: String,
    blob_key: String,
    original_filename: String,
    size_bytes: i64,
    placeholders: Json<Vec<DeclaredPlaceholder>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<TemplateRow> for Template {
    fn from(row: TemplateRow) -> Self {
        Template {
            id: row.id,
            name: row.name,
            owner: row.owner,
            blob_key: row.blob_key,
            original_filename: row.original_filename,
            size_bytes: row.size_bytes,
            placeholders: row.placeholders.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

pub struct PgTemplateRepository {
    pool: PgPool,
}

impl PgTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

#[async_trait]
impl TemplateRepository for PgTemplateRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Template>, RepositoryError> {
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {} FROM templates WHERE id = $1 AND deleted_at IS NULL",
            TEMPLATE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Template::from))
    }

    async fn find_live_by_name(&self, name: &str) -> Result<Option<Template>, RepositoryError> {
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {} FROM templates WHERE lower(name) = lower($1) AND deleted_at IS NULL",
            TEMPLATE_COLUMNS
        ))
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Template::from))
    }

    async fn list_live(&self) -> Result<Vec<Template>, RepositoryError> {
        let rows = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {} FROM templates WHERE deleted_at IS NULL ORDER BY lower(name)",
            TEMPLATE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Template::from).collect())
    }

    async fn insert(&self, template: NewTemplate) -> Result<Template, RepositoryError> {
        let name = template.name.clone();
        let result = sqlx::query_as::<_, TemplateRow>(&format!(
            r#"
            INSERT INTO templates (id, name, owner, blob_key, original_filename, size_bytes, placeholders)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            TEMPLATE_COLUMNS
        ))
        .bind(template.id)
        .bind(template.name)
        .bind(template.owner)
        .bind(template.blob_key)
        .bind(template.original_filename)
        .bind(template.size_bytes)
        .bind(Json(template.placeholders))
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::Duplicate(name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE templates SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

//! Template store: metadata repository + blob storage + blob cache.

use std::sync::Arc;
use std::time::Duration;

use actix_web::HttpResponse;
use moka::future::Cache;
use thiserror::Error;
use uuid::Uuid;

use super::model::{NewTemplate, Template, TemplateFields, TemplateSummary};
use super::repository::{RepositoryError, TemplateRepository};
use crate::auth::model::Claims;
use crate::generators::validation::{
    validate_scan, validate_template_name, validate_upload, ValidationError, ValidationErrors,
};
use crate::generators::{DocxRenderEngine, RenderError, TemplateScan};
use crate::storage::{template_blob_key, ObjectStorage};
use crate::ErrorResponse;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {0} not found")]
    NotFound(Uuid),
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error("{0}")]
    Conflict(String),
    #[error("admin privileges required")]
    Forbidden,
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for TemplateError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Duplicate(name) => {
                TemplateError::Conflict(format!("A template named '{}' already exists", name))
            }
            RepositoryError::Database(e) => TemplateError::Storage(e.to_string()),
        }
    }
}

impl From<TemplateError> for HttpResponse {
    fn from(error: TemplateError) -> Self {
        match error {
            TemplateError::NotFound(_) => {
                HttpResponse::NotFound().json(ErrorResponse::not_found(&error.to_string()))
            }
            TemplateError::Validation(errors) => {
                let message = format!("Template rejected: {} problem(s) found", errors.len());
                let details = serde_json::json!({ "problems": errors.into_vec() });
                HttpResponse::BadRequest()
                    .json(ErrorResponse::new("ValidationError", &message).with_details(details))
            }
            TemplateError::Conflict(message) => {
                HttpResponse::Conflict().json(ErrorResponse::new("Conflict", &message))
            }
            TemplateError::Forbidden => {
                HttpResponse::Forbidden().json(ErrorResponse::forbidden(&error.to_string()))
            }
            TemplateError::Storage(message) => {
                log::error!("Template storage failure: {}", message);
                HttpResponse::InternalServerError()
                    .json(ErrorResponse::internal_error("Template storage failure"))
            }
        }
    }
}

#[derive(Clone)]
pub struct TemplateStore {
    repo: Arc<dyn TemplateRepository>,
    storage: Arc<dyn ObjectStorage + Send + Sync>,
    blob_cache: Cache<Uuid, Arc<Vec<u8>>>,
    max_template_bytes: usize,
}

/// Total bytes of template blobs kept in memory.
const BLOB_CACHE_BYTES: u64 = 256 * 1024 * 1024;

impl TemplateStore {
    pub fn new(
        repo: Arc<dyn TemplateRepository>,
        storage: Arc<dyn ObjectStorage + Send + Sync>,
        max_template_bytes: usize,
    ) -> Self {
        Self::with_cache_budget(repo, storage, max_template_bytes, BLOB_CACHE_BYTES)
    }

    fn with_cache_budget(
        repo: Arc<dyn TemplateRepository>,
        storage: Arc<dyn ObjectStorage + Send + Sync>,
        max_template_bytes: usize,
        cache_bytes: u64,
    ) -> Self {
        let blob_cache = Cache::builder()
            .time_to_live(Duration::from_secs(30 * 60))
            .weigher(|_id: &Uuid, blob: &Arc<Vec<u8>>| -> u32 {
                blob.len().try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(cache_bytes)
            .build();

        Self {
            repo,
            storage,
            blob_cache,
            max_template_bytes,
        }
    }

    pub fn max_template_bytes(&self) -> usize {
        self.max_template_bytes
    }

    pub async fn get(&self, id: Uuid) -> Result<Template, TemplateError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(TemplateError::NotFound(id))
    }

    /// Template bytes, served from the cache when possible.
    pub async fn load_blob(&self, template: &Template) -> Result<Arc<Vec<u8>>, TemplateError> {
        let storage = self.storage.clone();
        let key = template.blob_key.clone();
        self.blob_cache
            .try_get_with(template.id, async move {
                log::debug!("Blob cache miss, downloading {}", key);
                storage.download_file(&key).await.map(Arc::new)
            })
            .await
            .map_err(|e| TemplateError::Storage(e.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<TemplateSummary>, TemplateError> {
        let templates = self.repo.list_live().await?;
        Ok(templates.iter().map(TemplateSummary::from).collect())
    }

    pub async fn fields(&self, id: Uuid) -> Result<TemplateFields, TemplateError> {
        let template = self.get(id).await?;
        Ok(TemplateFields {
            template_id: template.id,
            fields: template.placeholders,
        })
    }

    /// Validate and store a new template.
    ///
    /// Nothing is persisted unless every check passes.
    pub async fn create(
        &self,
        name: &str,
        filename: Option<&str>,
        blob: Vec<u8>,
        actor: &Claims,
    ) -> Result<Template, TemplateError> {
        if !actor.is_admin {
            return Err(TemplateError::Forbidden);
        }

        let mut errors = ValidationErrors::new();
        validate_template_name(name, &mut errors);
        validate_upload(filename, blob.len(), self.max_template_bytes, &mut errors);

        let blob = Arc::new(blob);
        let mut scan = TemplateScan::default();
        if !blob.is_empty() && blob.len() <= self.max_template_bytes {
            let bytes = blob.clone();
            let scanned = tokio::task::spawn_blocking(move || DocxRenderEngine::scan(&bytes))
                .await
                .map_err(|e| TemplateError::Storage(format!("template scan aborted: {}", e)))?;
            match scanned {
                Ok(result) => scan = result,
                Err(e) => errors.add(scan_error(&e)),
            }
        }
        validate_scan(&scan, &mut errors);
        errors.into_result().map_err(TemplateError::Validation)?;

        let name = name.trim();
        if self.repo.find_live_by_name(name).await?.is_some() {
            return Err(TemplateError::Conflict(format!(
                "A template named '{}' already exists",
                name
            )));
        }

        let id = Uuid::new_v4();
        let blob_key = template_blob_key(&id);
        self.storage
            .upload_file(&blob_key, &blob)
            .await
            .map_err(TemplateError::Storage)?;

        let new_template = NewTemplate {
            id,
            name: name.to_string(),
            owner: actor.sub.clone(),
            blob_key: blob_key.clone(),
            original_filename: filename.unwrap_or_default().to_string(),
            size_bytes: blob.len() as i64,
            placeholders: scan.placeholders.into_declared(),
        };

        let template = match self.repo.insert(new_template).await {
            Ok(template) => template,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete_file(&blob_key).await {
                    log::warn!("Failed to remove orphaned blob {}: {}", blob_key, cleanup);
                }
                return Err(e.into());
            }
        };

        self.blob_cache.insert(template.id, blob).await;
        log::info!(
            "Template '{}' ({}) stored with {} placeholder(s)",
            template.name,
            template.id,
            template.placeholders.len()
        );
        Ok(template)
    }

    /// Soft delete: the row and the blob are kept, the template stops being served.
    pub async fn delete(&self, id: Uuid, actor: &Claims) -> Result<(), TemplateError> {
        if !actor.is_admin {
            return Err(TemplateError::Forbidden);
        }
        if !self.repo.soft_delete(id).await? {
            return Err(TemplateError::NotFound(id));
        }
        self.blob_cache.invalidate(&id).await;
        log::info!("Template {} deleted by {}", id, actor.username);
        Ok(())
    }
}

fn scan_error(error: &RenderError) -> ValidationError {
    match error {
        RenderError::Container(e) => ValidationError::invalid_container(e),
        RenderError::Markup { part, source } => {
            ValidationError::new("file", format!("{} is not well-formed: {}", part, source))
        }
        other => ValidationError::new("file", other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use crate::template::repository::InMemoryTemplateRepository;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn docx(body: &str) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("[Content_Types].xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<Types/>").unwrap();
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        write!(
            writer,
            r#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>"#,
            body
        )
        .unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn claims(is_admin: bool) -> Claims {
        Claims {
            sub: Uuid::new_v4().to_string(),
            username: "tester".to_string(),
            is_admin,
            exp: 0,
            iat: 0,
            token_type: "access".to_string(),
        }
    }

    fn store() -> (TemplateStore, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        let store = TemplateStore::new(
            Arc::new(InMemoryTemplateRepository::new()),
            storage.clone(),
            1024 * 1024,
        );
        (store, storage)
    }

    #[tokio::test]
    async fn test_create_discovers_placeholders() {
        let (store, storage) = store();
        let template = store
            .create(
                "Inicial",
                Some("inicial.docx"),
                docx("{{ client_name }} / {{ valor_causa }}"),
                &claims(true),
            )
            .await
            .expect("Failed to create template");

        let names: Vec<&str> = template
            .placeholders
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["client_name", "valor_causa"]);
        assert!(storage.has_file(&template.blob_key));

        let blob = store.load_blob(&template).await.unwrap();
        assert_eq!(blob.len() as i64, template.size_bytes);
    }

    #[tokio::test]
    async fn test_create_requires_admin() {
        let (store, storage) = store();
        let result = store
            .create("x", Some("x.docx"), docx("ok"), &claims(false))
            .await;
        assert!(matches!(result, Err(TemplateError::Forbidden)));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_upload_collects_problems_and_persists_nothing() {
        let (store, storage) = store();
        let result = store
            .create(
                "",
                Some("x.docx"),
                docx("&lt;&lt;nome&gt;&gt; {{ 1abc }}"),
                &claims(true),
            )
            .await;
        match result {
            Err(TemplateError::Validation(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected result: {:?}", other.map(|t| t.id)),
        }
        assert!(storage.is_empty());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_zip_upload_is_rejected() {
        let (store, _) = store();
        let result = store
            .create("x", Some("x.docx"), b"not a zip".to_vec(), &claims(true))
            .await;
        assert!(matches!(result, Err(TemplateError::Validation(_))));
    }

    #[tokio::test]
    async fn test_duplicate_name_is_conflict() {
        let (store, _) = store();
        let admin = claims(true);
        store
            .create("Inicial", Some("a.docx"), docx("a"), &admin)
            .await
            .unwrap();
        let result = store
            .create("Inicial", Some("b.docx"), docx("b"), &admin)
            .await;
        assert!(matches!(result, Err(TemplateError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_is_soft_and_hides_template() {
        let (store, storage) = store();
        let admin = claims(true);
        let template = store
            .create("Inicial", Some("a.docx"), docx("a"), &admin)
            .await
            .unwrap();

        assert!(matches!(
            store.delete(template.id, &claims(false)).await,
            Err(TemplateError::Forbidden)
        ));
        store.delete(template.id, &admin).await.unwrap();

        assert!(matches!(
            store.get(template.id).await,
            Err(TemplateError::NotFound(_))
        ));
        assert!(storage.has_file(&template.blob_key));
        assert!(matches!(
            store.delete(template.id, &admin).await,
            Err(TemplateError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_blob_cache_is_bounded_by_bytes() {
        let blob = docx("{{ a }}");
        let budget = (blob.len() * 2 + blob.len() / 2) as u64;
        let store = TemplateStore::with_cache_budget(
            Arc::new(InMemoryTemplateRepository::new()),
            Arc::new(InMemoryStorage::new()),
            1024 * 1024,
            budget,
        );
        let admin = claims(true);

        let first = store
            .create("T0", Some("t.docx"), blob.clone(), &admin)
            .await
            .unwrap();
        store.blob_cache.run_pending_tasks().await;
        assert_eq!(store.blob_cache.weighted_size(), blob.len() as u64);

        for i in 1..6 {
            store
                .create(&format!("T{}", i), Some("t.docx"), blob.clone(), &admin)
                .await
                .unwrap();
        }
        store.blob_cache.run_pending_tasks().await;
        assert!(store.blob_cache.weighted_size() <= budget);
        assert!(store.blob_cache.entry_count() <= 2);

        // Evicted blobs are fetched from storage again.
        let reloaded = store.load_blob(&first).await.unwrap();
        assert_eq!(reloaded.as_slice(), blob.as_slice());
    }
}

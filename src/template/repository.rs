//! Template metadata persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use super::model::{NewTemplate, Template};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("a live template named '{0}' already exists")]
    Duplicate(String),
}

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Live (not deleted) template by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Template>, RepositoryError>;

    async fn find_live_by_name(&self, name: &str) -> Result<Option<Template>, RepositoryError>;

    /// Live templates ordered by name.
    async fn list_live(&self) -> Result<Vec<Template>, RepositoryError>;

    async fn insert(&self, template: NewTemplate) -> Result<Template, RepositoryError>;

    /// Mark a live template deleted. Returns false when there was none.
    async fn soft_delete(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

#[derive(Default)]
pub struct InMemoryTemplateRepository {
    templates: RwLock<HashMap<Uuid, Template>>,
}

impl InMemoryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row, deleted ones included.
    pub fn all(&self) -> Vec<Template> {
        self.templates.read().values().cloned().collect()
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[async_trait]
impl TemplateRepository for InMemoryTemplateRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Template>, RepositoryError> {
        Ok(self
            .templates
            .read()
            .get(&id)
            .filter(|t| !t.is_deleted())
            .cloned())
    }

    async fn find_live_by_name(&self, name: &str) -> Result<Option<Template>, RepositoryError> {
        Ok(self
            .templates
            .read()
            .values()
            .find(|t| !t.is_deleted() && same_name(&t.name, name))
            .cloned())
    }

    async fn list_live(&self) -> Result<Vec<Template>, RepositoryError> {
        let mut live: Vec<Template> = self
            .templates
            .read()
            .values()
            .filter(|t| !t.is_deleted())
            .cloned()
            .collect();
        live.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(live)
    }

    async fn insert(&self, template: NewTemplate) -> Result<Template, RepositoryError> {
        let mut templates = self.templates.write();
        if templates
            .values()
            .any(|t| !t.is_deleted() && same_name(&t.name, &template.name))
        {
            return Err(RepositoryError::Duplicate(template.name));
        }
        let template = template.into_template(Utc::now());
        templates.insert(template.id, template.clone());
        Ok(template)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut templates = self.templates.write();
        match templates.get_mut(&id) {
            Some(template) if !template.is_deleted() => {
                let now = Utc::now();
                template.deleted_at = Some(now);
                template.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_template(name: &str) -> NewTemplate {
        let id = Uuid::new_v4();
        NewTemplate {
            id,
            name: name.to_string(),
            owner: "admin".to_string(),
            blob_key: crate::storage::template_blob_key(&id),
            original_filename: "t.docx".to_string(),
            size_bytes: 10,
            placeholders: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_names_are_unique_among_live_templates() {
        let repo = InMemoryTemplateRepository::new();
        let first = repo.insert(new_template("Inicial")).await.unwrap();

        let dup = repo.insert(new_template(" inicial ")).await;
        assert!(matches!(dup, Err(RepositoryError::Duplicate(_))));

        assert!(repo.soft_delete(first.id).await.unwrap());
        assert!(repo.insert(new_template("Inicial")).await.is_ok());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_but_keeps_row() {
        let repo = InMemoryTemplateRepository::new();
        let template = repo.insert(new_template("Contestação")).await.unwrap();

        assert!(repo.soft_delete(template.id).await.unwrap());
        assert!(!repo.soft_delete(template.id).await.unwrap());
        assert!(repo.find_by_id(template.id).await.unwrap().is_none());
        assert!(repo.list_live().await.unwrap().is_empty());
        assert_eq!(repo.all().len(), 1);
        assert!(repo.all()[0].deleted_at.is_some());
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_name() {
        let repo = InMemoryTemplateRepository::new();
        for name in ["recurso", "Apelação", "contestação"] {
            repo.insert(new_template(name)).await.unwrap();
        }
        let names: Vec<String> = repo
            .list_live()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Apelação", "contestação", "recurso"]);
    }
}

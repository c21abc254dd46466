#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use jurisdoc_server::auth::generate_access_token;
use jurisdoc_server::auth::model::Claims;
use jurisdoc_server::auth::repository::InMemoryUserRepository;
use jurisdoc_server::config::{AppConfig, AuthConfig};
use jurisdoc_server::generators::markup::paragraph_texts;
use jurisdoc_server::generators::DocxPackage;
use jurisdoc_server::storage::InMemoryStorage;
use jurisdoc_server::template::model::{NewTemplate, Template};
use jurisdoc_server::template::repository::{
    InMemoryTemplateRepository, RepositoryError, TemplateRepository,
};
use jurisdoc_server::AppState;

pub const BOUNDARY: &str = "----jurisdoc-test-boundary";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:styleId="Normal"/></w:styles>"#;

/// One `<w:p>` per entry, one `<w:r><w:t>` per run text.
pub fn part_xml(root: &str, paragraphs: &[&[&str]]) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:{} xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
        root
    );
    if root == "document" {
        xml.push_str("<w:body>");
    }
    for runs in paragraphs {
        xml.push_str("<w:p>");
        for (i, run) in runs.iter().enumerate() {
            // Alternate formatting so split runs are distinguishable.
            let props = if i % 2 == 1 { "<w:rPr><w:b/></w:rPr>" } else { "" };
            xml.push_str(&format!(
                "<w:r>{}<w:t>{}</w:t></w:r>",
                props,
                quick_xml::escape::escape(*run)
            ));
        }
        xml.push_str("</w:p>");
    }
    if root == "document" {
        xml.push_str("</w:body>");
    }
    xml.push_str(&format!("</w:{}>", root));
    xml
}

pub fn docx_with_header(body: &[&[&str]], header: Option<&[&[&str]]>) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    let mut entries = vec![
        ("[Content_Types].xml".to_string(), CONTENT_TYPES.to_string()),
        ("word/document.xml".to_string(), part_xml("document", body)),
        ("word/styles.xml".to_string(), STYLES.to_string()),
    ];
    if let Some(header) = header {
        entries.push(("word/header1.xml".to_string(), part_xml("hdr", header)));
    }

    for (name, content) in entries {
        writer
            .start_file(name, options)
            .expect("Failed to start zip entry");
        writer
            .write_all(content.as_bytes())
            .expect("Failed to write zip entry");
    }
    writer
        .finish()
        .expect("Failed to finish zip")
        .into_inner()
}

pub fn docx(body: &[&[&str]]) -> Vec<u8> {
    docx_with_header(body, None)
}

/// Merged paragraph texts of a part of a rendered document.
pub fn part_text(bytes: &[u8], part: &str) -> Vec<String> {
    let package = DocxPackage::open(bytes).expect("Failed to open rendered document");
    let xml = package.part(part).expect("Part missing from document");
    paragraph_texts(xml).expect("Rendered part is not well-formed")
}

pub fn document_text(bytes: &[u8]) -> Vec<String> {
    part_text(bytes, "word/document.xml")
}

pub fn test_config() -> AppConfig {
    AppConfig {
        auth: AuthConfig {
            jwt_secret: "integration-test-secret".to_string(),
            ..AuthConfig::default()
        },
        ..AppConfig::default()
    }
}

pub fn test_state() -> AppState {
    AppState::in_memory(test_config())
}

pub fn claims(is_admin: bool) -> Claims {
    Claims {
        sub: Uuid::new_v4().to_string(),
        username: if is_admin { "admin" } else { "estagiario" }.to_string(),
        is_admin,
        exp: 0,
        iat: 0,
        token_type: "access".to_string(),
    }
}

pub fn bearer(state: &AppState, is_admin: bool) -> String {
    let token = generate_access_token(
        &state.config.auth,
        &Uuid::new_v4().to_string(),
        if is_admin { "admin" } else { "estagiario" },
        is_admin,
    )
    .expect("Failed to generate access token");
    format!("Bearer {}", token)
}

/// Store a template directly through the store, bypassing HTTP.
pub async fn seed_template(state: &AppState, name: &str, body: &[&[&str]]) -> Template {
    state
        .templates
        .create(
            name,
            Some(&format!("{}.docx", name)),
            docx(body),
            &claims(true),
        )
        .await
        .expect("Failed to seed template")
}

/// `multipart/form-data` body with a `name` field and a `file` field.
pub fn multipart_body(name: &str, filename: &str, file: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    write!(
        body,
        "--{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n",
        b = BOUNDARY,
        name = name
    )
    .unwrap();
    write!(
        body,
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/vnd.openxmlformats-officedocument.wordprocessingml.document\r\n\r\n",
        b = BOUNDARY,
        f = filename
    )
    .unwrap();
    body.extend_from_slice(file);
    write!(body, "\r\n--{}--\r\n", BOUNDARY).unwrap();

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

/// Template repository that counts every call, to prove a request never
/// reached the store.
#[derive(Default)]
pub struct CountingTemplateRepository {
    inner: InMemoryTemplateRepository,
    calls: AtomicUsize,
}

impl CountingTemplateRepository {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TemplateRepository for CountingTemplateRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Template>, RepositoryError> {
        self.hit();
        self.inner.find_by_id(id).await
    }

    async fn find_live_by_name(&self, name: &str) -> Result<Option<Template>, RepositoryError> {
        self.hit();
        self.inner.find_live_by_name(name).await
    }

    async fn list_live(&self) -> Result<Vec<Template>, RepositoryError> {
        self.hit();
        self.inner.list_live().await
    }

    async fn insert(&self, template: NewTemplate) -> Result<Template, RepositoryError> {
        self.hit();
        self.inner.insert(template).await
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        self.hit();
        self.inner.soft_delete(id).await
    }
}

pub fn counting_state() -> (AppState, Arc<CountingTemplateRepository>) {
    let repo = Arc::new(CountingTemplateRepository::default());
    let state = AppState::with_backends(
        test_config(),
        repo.clone(),
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(InMemoryStorage::new()),
    );
    (state, repo)
}

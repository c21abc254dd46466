//! Template upload validation.
//!
//! Every problem found in an upload is collected so the author can fix the
//! template in one pass instead of re-uploading per error.

use std::fmt;

use serde::Serialize;
use utoipa::ToSchema;

use super::docx::DocxError;
use super::engine::TemplateScan;

pub const MAX_TEMPLATE_NAME_CHARS: usize = 120;

/// Validation error with a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ValidationError {
    /// The field that failed validation
    pub field: String,
    pub message: String,
    /// Suggestion for how to fix the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn empty_field(field: &str) -> Self {
        Self::new(field, format!("{} must not be empty", field))
    }

    pub fn legacy_marker(marker: &str) -> Self {
        Self::new("file", format!("legacy marker '{}' is not supported", marker))
            .with_suggestion("Rewrite it as {{ field_name }}")
    }

    pub fn control_block(block: &str) -> Self {
        Self::new("file", format!("control block '{}' is not supported", block))
            .with_suggestion("Only {{ field }} substitution is available")
    }

    pub fn invalid_container(error: &DocxError) -> Self {
        Self::new("file", format!("not a usable .docx document: {}", error))
            .with_suggestion("Save the document from Word as .docx and upload it again")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn single(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.errors
    }

    /// Ok if no errors were collected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "; {}", error)?;
        }
        Ok(())
    }
}

// ============================================================================
// Validation functions
// ============================================================================

/// Validate a template display name.
pub fn validate_template_name(value: &str, errors: &mut ValidationErrors) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(ValidationError::empty_field("name"));
        return;
    }
    if trimmed.chars().count() > MAX_TEMPLATE_NAME_CHARS {
        errors.add(ValidationError::new(
            "name",
            format!("name must be at most {} characters", MAX_TEMPLATE_NAME_CHARS),
        ));
    }
}

/// Validate the uploaded file name and size.
pub fn validate_upload(
    filename: Option<&str>,
    size: usize,
    max_bytes: usize,
    errors: &mut ValidationErrors,
) {
    match filename {
        Some(name) if name.to_lowercase().ends_with(".docx") => {}
        Some(name) => errors.add(
            ValidationError::new("file", format!("'{}' is not a .docx file", name))
                .with_suggestion("Only Word .docx templates are accepted"),
        ),
        None => errors.add(ValidationError::new("file", "file name is missing")),
    }

    if size == 0 {
        errors.add(ValidationError::new("file", "file is empty"));
    } else if size > max_bytes {
        errors.add(ValidationError::new(
            "file",
            format!("file exceeds the {} byte limit", max_bytes),
        ));
    }
}

/// Turn the findings of a template scan into validation errors.
pub fn validate_scan(scan: &TemplateScan, errors: &mut ValidationErrors) {
    for expression in &scan.invalid_expressions {
        errors.add(
            ValidationError::new("file", expression.clone())
                .with_suggestion("Use {{ name }} or {{ name | filter }}"),
        );
    }
    for marker in &scan.legacy_markers {
        errors.add(ValidationError::legacy_marker(marker));
    }
    for block in &scan.control_blocks {
        errors.add(ValidationError::control_block(block));
    }
}

//! Generators module - business logic for producing petitions from `.docx` templates.
//!
//! - `placeholder` - `{{ name | filter }}` expressions and the declared placeholder set
//! - `resolver` - maps request fields onto a template's placeholders
//! - `docx` / `markup` - the container and its XML text parts
//! - `engine` - scanning and rendering templates

pub mod common;
pub mod docx;
pub mod engine;
pub mod markup;
pub mod placeholder;
pub mod resolver;
pub mod validation;

pub use docx::{DocxError, DocxPackage, DOCX_CONTENT_TYPE};
pub use engine::{DocxRenderEngine, TemplateScan};
pub use placeholder::{DeclaredPlaceholder, FieldKind, PlaceholderSet};
pub use resolver::{ResolveError, ResolvedVariables, VariableResolver};

use thiserror::Error;

use markup::MarkupError;
use placeholder::PlaceholderError;

/// Errors that can occur while rendering a document.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Container(#[from] DocxError),
    #[error("malformed part '{part}': {source}")]
    Markup {
        part: String,
        #[source]
        source: MarkupError,
    },
    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),
    #[error("no value for placeholder '{0}'")]
    MissingValue(String),
    #[error("placeholder '{name}' resolves to an unsupported {kind} value")]
    UnsupportedValue { name: String, kind: &'static str },
    #[error("rendering task failed: {0}")]
    Aborted(String),
}

impl From<MarkupError> for RenderError {
    fn from(source: MarkupError) -> Self {
        RenderError::Markup {
            part: String::new(),
            source,
        }
    }
}

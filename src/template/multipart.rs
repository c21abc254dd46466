use actix_multipart::Multipart;
use actix_web::HttpResponse;
use futures_util::StreamExt;
use sanitize_filename::sanitize;

use crate::generators::validation::MAX_TEMPLATE_NAME_CHARS;
use crate::ErrorResponse;

/// Longest `name` field accepted off the wire; UTF-8 needs at most 4 bytes per char.
const MAX_NAME_BYTES: usize = MAX_TEMPLATE_NAME_CHARS * 4;

/// Fields of a template upload form.
#[derive(Debug, Default)]
pub struct TemplateUpload {
    pub name: String,
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum MultipartParseError {
    #[error("Multipart field error: {0}")]
    FieldError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Invalid UTF-8 data: {0}")]
    Utf8Error(String),
    #[error("file exceeds the {0} byte limit")]
    TooLarge(usize),
    #[error("name exceeds the {0} byte limit")]
    NameTooLong(usize),
    #[error("missing form field '{0}'")]
    MissingField(&'static str),
}

impl From<MultipartParseError> for HttpResponse {
    fn from(error: MultipartParseError) -> Self {
        match error {
            MultipartParseError::IoError(_) => HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error(&format!("{}", error))),
            MultipartParseError::TooLarge(_) | MultipartParseError::NameTooLong(_) => {
                HttpResponse::BadRequest()
                    .json(ErrorResponse::new("ValidationError", &format!("{}", error)))
            }
            _ => HttpResponse::BadRequest().json(ErrorResponse::bad_request(&format!("{}", error))),
        }
    }
}

pub struct MultipartParser;

impl MultipartParser {
    /// Read the `name` and `file` fields; the file is capped at `max_bytes`.
    pub async fn parse_template_upload(
        mut multipart: Multipart,
        max_bytes: usize,
    ) -> Result<TemplateUpload, MultipartParseError> {
        let mut upload = TemplateUpload::default();
        let mut has_file = false;

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| MultipartParseError::FieldError(e.to_string()))?;
            let content_disposition = field.content_disposition().ok_or_else(|| {
                MultipartParseError::FieldError("Content disposition not found".to_string())
            })?;
            let name = content_disposition
                .get_name()
                .ok_or_else(|| MultipartParseError::FieldError("Field name not found".to_string()))?
                .to_string();
            let maybe_filename = content_disposition.get_filename().map(sanitize);

            match name.as_str() {
                "name" => {
                    let mut buffer = Vec::new();
                    while let Some(chunk) = field.next().await {
                        let data_chunk =
                            chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
                        if buffer.len() + data_chunk.len() > MAX_NAME_BYTES {
                            return Err(MultipartParseError::NameTooLong(MAX_NAME_BYTES));
                        }
                        buffer.extend_from_slice(&data_chunk);
                    }
                    upload.name = String::from_utf8(buffer)
                        .map_err(|e| MultipartParseError::Utf8Error(e.to_string()))?;
                }
                "file" => {
                    has_file = true;
                    upload.filename = maybe_filename;
                    while let Some(chunk) = field.next().await {
                        let data_chunk =
                            chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
                        if upload.data.len() + data_chunk.len() > max_bytes {
                            return Err(MultipartParseError::TooLarge(max_bytes));
                        }
                        upload.data.extend_from_slice(&data_chunk);
                    }
                }
                other => {
                    log::debug!("Ignoring unexpected multipart field '{}'", other);
                    while let Some(chunk) = field.next().await {
                        chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
                    }
                }
            }
        }

        if !has_file {
            return Err(MultipartParseError::MissingField("file"));
        }
        Ok(upload)
    }
}

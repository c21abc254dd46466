pub mod handlers;
pub mod model;
pub mod multipart;
pub mod repository;
pub mod store;

pub use model::{Template, TemplateFields, TemplateSummary};
pub use store::{TemplateError, TemplateStore};

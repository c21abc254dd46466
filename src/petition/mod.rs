pub mod handlers;
pub mod model;
pub mod service;

pub use model::{GenerationRequest, RenderTemplateRequest, RenderedDocument};
pub use service::{generate, GenerationError};

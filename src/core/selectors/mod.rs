pub mod selector_models;
pub mod selector_resolver;

pub use selector_models::{UploadTask, WorksheetSelector};
pub use selector_resolver::resolve_arguments;

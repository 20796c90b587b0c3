pub mod spreadsheet_backend;
pub mod upload_service;

pub use spreadsheet_backend::{BackendError, SpreadsheetBackend, Worksheet};
pub use upload_service::{plan_uploads, UploadError, UploadOutcome, UploadReport, UploadService};

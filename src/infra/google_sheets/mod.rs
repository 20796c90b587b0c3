// Google Sheets v4 implementation of the core `SpreadsheetBackend`.
//
// All requests go through one authorized `reqwest::Client`; every API failure is
// surfaced as a `BackendError` and aborts the run.

pub mod sheets_client;

pub use sheets_client::{extract_spreadsheet_id, SheetsApiClient, ValueInputOption};

use async_trait::async_trait;
use thiserror::Error;

use crate::core::auth::AuthError;
use crate::core::batch::CellUpdate;
use crate::core::selectors::WorksheetSelector;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Worksheet {0} is still missing after creating it")]
    WorksheetMissing(WorksheetSelector),
    #[error("Spreadsheet API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("Spreadsheet request failed: {0}")]
    Transport(String),
    #[error("Not authorized")]
    Auth(#[from] AuthError),
}

/// One tab of the target spreadsheet, as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worksheet {
    pub sheet_id: i64,
    pub title: String,
    /// Zero-based position in document order.
    pub index: usize,
    pub row_count: usize,
    pub col_count: usize,
}

/// The spreadsheet operations the upload needs.
///
/// Listing always returns worksheets in document order. A batch of cell updates
/// is assumed to be applied as a whole.
#[async_trait]
pub trait SpreadsheetBackend: Send + Sync {
    async fn list_worksheets(&self, title: Option<&str>) -> Result<Vec<Worksheet>, BackendError>;
    async fn create_worksheet(
        &self,
        title: &str,
        rows: usize,
        cols: usize,
    ) -> Result<(), BackendError>;
    async fn resize_worksheet(
        &self,
        worksheet: &Worksheet,
        rows: usize,
        cols: usize,
    ) -> Result<(), BackendError>;
    async fn update_cells(
        &self,
        worksheet: &Worksheet,
        updates: &[CellUpdate],
    ) -> Result<(), BackendError>;
}

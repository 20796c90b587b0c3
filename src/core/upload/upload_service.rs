// Upload service - drives one upload task at a time against a spreadsheet backend.
//
// For each task: build the grid from the CSV, find (or create) the worksheet, resize it
// to the grid's bounding box and write every cell. Tasks run strictly in order and the
// first failure stops the run.

use std::collections::HashSet;
use std::path::PathBuf;

use thiserror::Error;

use super::spreadsheet_backend::{BackendError, SpreadsheetBackend, Worksheet};
use crate::core::batch::{BatchBuilder, BatchError, CellGrid};
use crate::core::selectors::{UploadTask, WorksheetSelector};

/// Size given to worksheets created on demand; the upload resizes them right after.
const NEW_SHEET_ROWS: usize = 1;
const NEW_SHEET_COLS: usize = 1;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("Uploading {} into worksheet {selector} failed", path.display())]
    Backend {
        path: PathBuf,
        selector: WorksheetSelector,
        #[source]
        source: BackendError,
    },
}

/// What happened to a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded {
        worksheet: String,
        rows: usize,
        cols: usize,
    },
    /// Dry run: the grid was built but nothing was sent.
    Planned { rows: usize, cols: usize },
    /// The file had no rows; the worksheet was left untouched.
    SkippedEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub task: UploadTask,
    pub outcome: UploadOutcome,
}

pub struct UploadService<B: SpreadsheetBackend> {
    backend: B,
    builder: BatchBuilder,
}

impl<B: SpreadsheetBackend> UploadService<B> {
    pub fn new(backend: B, builder: BatchBuilder) -> Self {
        Self { backend, builder }
    }

    /// Uploads every task in order. Stops at the first error.
    pub async fn upload_all(&self, tasks: &[UploadTask]) -> Result<Vec<UploadReport>, UploadError> {
        let mut reports = Vec::with_capacity(tasks.len());
        for task in tasks {
            reports.push(self.upload(task).await?);
        }
        Ok(reports)
    }

    pub async fn upload(&self, task: &UploadTask) -> Result<UploadReport, UploadError> {
        let grid = self.builder.build_from_path(&task.path).await?;
        if grid.is_empty() {
            tracing::warn!(file = %task.path.display(), "Skipping empty file");
            return Ok(UploadReport {
                task: task.clone(),
                outcome: UploadOutcome::SkippedEmpty,
            });
        }

        let worksheet = self
            .write_grid(&task.selector, &grid)
            .await
            .map_err(|source| UploadError::Backend {
                path: task.path.clone(),
                selector: task.selector.clone(),
                source,
            })?;

        let (rows, cols) = grid.dimensions();
        tracing::info!(
            file = %task.path.display(),
            worksheet = %worksheet.title,
            rows,
            cols,
            cells = grid.cell_count(),
            "Uploaded worksheet"
        );

        Ok(UploadReport {
            task: task.clone(),
            outcome: UploadOutcome::Uploaded {
                worksheet: worksheet.title,
                rows,
                cols,
            },
        })
    }

    async fn write_grid(
        &self,
        selector: &WorksheetSelector,
        grid: &CellGrid,
    ) -> Result<Worksheet, BackendError> {
        let worksheet = self.resolve_worksheet(selector).await?;
        let (rows, cols) = grid.dimensions();

        tracing::debug!(
            worksheet = %worksheet.title,
            from_rows = worksheet.row_count,
            from_cols = worksheet.col_count,
            rows,
            cols,
            "Resizing worksheet"
        );
        self.backend.resize_worksheet(&worksheet, rows, cols).await?;
        self.backend
            .update_cells(&worksheet, &grid.updates())
            .await?;

        Ok(worksheet)
    }

    /// Finds the worksheet a selector points at, creating it when it doesn't exist yet.
    pub async fn resolve_worksheet(
        &self,
        selector: &WorksheetSelector,
    ) -> Result<Worksheet, BackendError> {
        match selector {
            WorksheetSelector::ByIndex(index) => self.resolve_by_index(selector, *index).await,
            WorksheetSelector::ByName(title) => self.resolve_by_name(selector, title).await,
        }
    }

    async fn resolve_by_index(
        &self,
        selector: &WorksheetSelector,
        index: usize,
    ) -> Result<Worksheet, BackendError> {
        let mut worksheets = self.backend.list_worksheets(None).await?;

        if worksheets.len() <= index {
            let mut names = PlaceholderNames::new(&worksheets);
            for _ in worksheets.len()..=index {
                let title = names.next();
                tracing::info!(worksheet = %title, "Creating placeholder worksheet");
                self.backend
                    .create_worksheet(&title, NEW_SHEET_ROWS, NEW_SHEET_COLS)
                    .await?;
            }
            worksheets = self.backend.list_worksheets(None).await?;
        }

        worksheets
            .into_iter()
            .nth(index)
            .ok_or_else(|| BackendError::WorksheetMissing(selector.clone()))
    }

    async fn resolve_by_name(
        &self,
        selector: &WorksheetSelector,
        title: &str,
    ) -> Result<Worksheet, BackendError> {
        if let Some(existing) = self.find_by_title(title).await? {
            return Ok(existing);
        }

        tracing::info!(worksheet = %title, "Creating worksheet");
        self.backend
            .create_worksheet(title, NEW_SHEET_ROWS, NEW_SHEET_COLS)
            .await?;

        self.find_by_title(title)
            .await?
            .ok_or_else(|| BackendError::WorksheetMissing(selector.clone()))
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Worksheet>, BackendError> {
        Ok(self
            .backend
            .list_worksheets(Some(title))
            .await?
            .into_iter()
            .find(|w| w.title == title))
    }
}

/// Builds every grid without touching the backend. Used for dry runs.
pub async fn plan_uploads(
    builder: &BatchBuilder,
    tasks: &[UploadTask],
) -> Result<Vec<UploadReport>, UploadError> {
    let mut reports = Vec::with_capacity(tasks.len());
    for task in tasks {
        let grid = builder.build_from_path(&task.path).await?;
        let outcome = if grid.is_empty() {
            UploadOutcome::SkippedEmpty
        } else {
            let (rows, cols) = grid.dimensions();
            UploadOutcome::Planned { rows, cols }
        };
        tracing::info!(
            file = %task.path.display(),
            worksheet = %task.selector,
            ?outcome,
            "Planned upload"
        );
        reports.push(UploadReport {
            task: task.clone(),
            outcome,
        });
    }
    Ok(reports)
}

/// Sequential `Sheet<k>` titles that don't collide with existing worksheets.
struct PlaceholderNames {
    taken: HashSet<String>,
    counter: usize,
}

impl PlaceholderNames {
    fn new(existing: &[Worksheet]) -> Self {
        Self {
            taken: existing.iter().map(|w| w.title.clone()).collect(),
            counter: existing.len(),
        }
    }

    fn next(&mut self) -> String {
        loop {
            self.counter += 1;
            let title = format!("Sheet{}", self.counter);
            if self.taken.insert(title.clone()) {
                return title;
            }
        }
    }
}

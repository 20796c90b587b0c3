// Batch builder - converts one CSV file into the full set of cell writes for a worksheet.
//
// The destination sheet must end up looking exactly like the file, so every position
// inside the file's bounding box is written. Positions the file doesn't fill (short
// rows, empty fields) are written as empty strings, which clears whatever an older,
// larger upload left behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not valid UTF-8 (line {line})", path.display())]
    Encoding { path: PathBuf, line: u64 },
    #[error("Malformed CSV in {}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// A single "set this cell" instruction. Rows and columns are 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub row: usize,
    pub col: usize,
    pub value: String,
}

impl CellUpdate {
    pub fn new(row: usize, col: usize, value: impl Into<String>) -> Self {
        Self {
            row,
            col,
            value: value.into(),
        }
    }
}

/// The logical content of a CSV file: the non-empty cells plus the bounding box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellGrid {
    cells: BTreeMap<(usize, usize), String>,
    rows: usize,
    cols: usize,
}

impl CellGrid {
    fn push_row<F: AsRef<str>>(&mut self, fields: impl IntoIterator<Item = F>) {
        self.rows += 1;
        let row = self.rows;
        let mut width = 0;
        for (offset, field) in fields.into_iter().enumerate() {
            width = offset + 1;
            let value = field.as_ref();
            if !value.is_empty() {
                self.cells.insert((row, offset + 1), value.to_string());
            }
        }
        self.cols = self.cols.max(width);
    }

    fn push_blank_rows(&mut self, count: usize) {
        for _ in 0..count {
            self.push_row(std::iter::empty::<&str>());
        }
    }

    /// `(rows, cols)` of the bounding box; `(0, 0)` for an empty file.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Number of writes [`CellGrid::updates`] will produce.
    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Every cell in the bounding box, row-major, with explicit empty strings for the gaps.
    pub fn updates(&self) -> Vec<CellUpdate> {
        let mut updates = Vec::with_capacity(self.cell_count());
        for row in 1..=self.rows {
            for col in 1..=self.cols {
                let value = self.cells.get(&(row, col)).cloned().unwrap_or_default();
                updates.push(CellUpdate::new(row, col, value));
            }
        }
        updates
    }
}

/// Reads CSV files into [`CellGrid`]s.
#[derive(Debug, Clone, Copy)]
pub struct BatchBuilder {
    delimiter: u8,
}

impl Default for BatchBuilder {
    fn default() -> Self {
        Self::new(b',')
    }
}

impl BatchBuilder {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    pub async fn build_from_path(&self, path: &Path) -> Result<CellGrid, BatchError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| BatchError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        self.build_from_bytes(&bytes).map_err(|source| {
            let bad_line = match source.kind() {
                csv::ErrorKind::Utf8 { pos, .. } => Some(pos.as_ref().map_or(0, |p| p.line())),
                _ => None,
            };
            match bad_line {
                Some(line) => BatchError::Encoding {
                    path: path.to_path_buf(),
                    line,
                },
                None => BatchError::Csv {
                    path: path.to_path_buf(),
                    source,
                },
            }
        })
    }

    /// Parses in-memory CSV content. A leading UTF-8 byte-order mark is ignored.
    ///
    /// Blank lines are rows too. The csv reader skips them, so they are put back
    /// as empty rows by looking at the terminators around each record's end.
    pub fn build_from_bytes(&self, bytes: &[u8]) -> Result<CellGrid, csv::Error> {
        let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(content);

        let mut grid = CellGrid::default();
        grid.push_blank_rows(lines_in(terminator_run(content, 0)));

        let mut record = csv::StringRecord::new();
        while reader.read_record(&mut record)? {
            grid.push_row(record.iter());

            // The run holds this record's own terminator plus one per blank line.
            let end = usize::try_from(reader.position().byte()).unwrap_or(content.len());
            let run = terminator_run(content, end);
            grid.push_blank_rows(lines_in(run).saturating_sub(1));
        }

        Ok(grid)
    }
}

fn is_terminator(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n'
}

/// The contiguous `\r`/`\n` bytes touching `at`, on both sides.
fn terminator_run(content: &[u8], at: usize) -> &[u8] {
    let at = at.min(content.len());
    let start = content[..at]
        .iter()
        .rposition(|b| !is_terminator(*b))
        .map_or(0, |i| i + 1);
    let end = content[at..]
        .iter()
        .position(|b| !is_terminator(*b))
        .map_or(content.len(), |i| at + i);
    &content[start..end]
}

/// Line endings in a run of terminators; `\r\n` counts once.
fn lines_in(run: &[u8]) -> usize {
    let mut lines = 0;
    let mut i = 0;
    while i < run.len() {
        if run[i] == b'\r' && run.get(i + 1) == Some(&b'\n') {
            i += 2;
        } else {
            i += 1;
        }
        lines += 1;
    }
    lines
}

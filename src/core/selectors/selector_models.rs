use std::fmt;
use std::path::PathBuf;

/// Identifies the worksheet a file should be uploaded into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorksheetSelector {
    /// Zero-based position among the existing worksheets, in document order.
    ByIndex(usize),
    /// Exact worksheet title. Also used as the title when the sheet has to be created.
    ByName(String),
}

impl fmt::Display for WorksheetSelector {
    // Users type 1-based indexes, so that's what we echo back to them.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorksheetSelector::ByIndex(index) => write!(f, "#{}", index + 1),
            WorksheetSelector::ByName(name) => write!(f, "\"{}\"", name),
        }
    }
}

/// One CSV file paired with the worksheet it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub path: PathBuf,
    pub selector: WorksheetSelector,
}

// Turns the raw `filename[:sheet]` arguments into upload tasks.
//
// Every file ends up with exactly one worksheet selector, and no two files may
// target the same worksheet. Files without an explicit target either default to
// their base name (name mode) or take the lowest sheet slot nobody asked for.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::selector_models::{UploadTask, WorksheetSelector};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Invalid worksheet index in '{0}': indexes start at 1")]
    IndexStartsAtOne(String),
    #[error("Invalid worksheet index in '{0}': number is too large")]
    IndexTooLarge(String),
    #[error("Missing filename in '{0}'")]
    MissingFilename(String),
    #[error("Cannot derive a worksheet name from '{0}'")]
    UnnamedFile(String),
    #[error("Duplicate worksheet selectors: {}", format_selectors(.0))]
    Duplicates(Vec<WorksheetSelector>),
}

fn format_selectors(selectors: &[WorksheetSelector]) -> String {
    selectors
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolves every token into an [`UploadTask`], preserving input order.
///
/// With `name_by_filename` set, a bare `data/report.csv` targets the worksheet
/// titled `report`. Otherwise bare filenames are auto-allocated to the smallest
/// indexes not explicitly claimed by another token.
pub fn resolve_arguments<S: AsRef<str>>(
    tokens: &[S],
    name_by_filename: bool,
) -> Result<Vec<UploadTask>, ResolveError> {
    let mut parsed: Vec<(PathBuf, Option<WorksheetSelector>)> = Vec::with_capacity(tokens.len());
    for token in tokens {
        parsed.push(parse_token(token.as_ref(), name_by_filename)?);
    }

    let claimed: BTreeSet<usize> = parsed
        .iter()
        .filter_map(|(_, selector)| match selector {
            Some(WorksheetSelector::ByIndex(index)) => Some(*index),
            _ => None,
        })
        .collect();
    let mut free_slots = FreeSlots::new(claimed);

    let tasks: Vec<UploadTask> = parsed
        .into_iter()
        .map(|(path, selector)| UploadTask {
            path,
            selector: selector.unwrap_or_else(|| WorksheetSelector::ByIndex(free_slots.next())),
        })
        .collect();

    let duplicates = find_duplicates(&tasks);
    if !duplicates.is_empty() {
        return Err(ResolveError::Duplicates(duplicates));
    }

    Ok(tasks)
}

/// Splits `filename:suffix` at the last colon and interprets the suffix.
fn parse_token(
    token: &str,
    name_by_filename: bool,
) -> Result<(PathBuf, Option<WorksheetSelector>), ResolveError> {
    let (filename, suffix) = match token.rsplit_once(':') {
        Some((filename, suffix)) if !suffix.is_empty() => (filename, Some(suffix)),
        Some((filename, _)) => (filename, None),
        None => (token, None),
    };

    if filename.is_empty() {
        return Err(ResolveError::MissingFilename(token.to_string()));
    }

    let selector = match suffix {
        Some(suffix) => Some(parse_suffix(token, suffix)?),
        None if name_by_filename => Some(WorksheetSelector::ByName(base_name(token, filename)?)),
        None => None,
    };

    Ok((PathBuf::from(filename), selector))
}

/// Plain digits select an index, anything else is a worksheet name. A leading
/// minus sign is read as a (necessarily invalid) index rather than a name.
fn parse_suffix(token: &str, suffix: &str) -> Result<WorksheetSelector, ResolveError> {
    let digits = suffix.strip_prefix('-').unwrap_or(suffix);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(WorksheetSelector::ByName(suffix.to_string()));
    }
    if digits.len() != suffix.len() {
        return Err(ResolveError::IndexStartsAtOne(token.to_string()));
    }

    match suffix.parse::<usize>() {
        Ok(0) => Err(ResolveError::IndexStartsAtOne(token.to_string())),
        Ok(index) => Ok(WorksheetSelector::ByIndex(index - 1)),
        Err(_) => Err(ResolveError::IndexTooLarge(token.to_string())),
    }
}

fn base_name(token: &str, filename: &str) -> Result<String, ResolveError> {
    Path::new(filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| ResolveError::UnnamedFile(token.to_string()))
}

/// Hands out the lowest indexes not present in the claimed set.
struct FreeSlots {
    claimed: BTreeSet<usize>,
    cursor: usize,
}

impl FreeSlots {
    fn new(claimed: BTreeSet<usize>) -> Self {
        Self { claimed, cursor: 0 }
    }

    fn next(&mut self) -> usize {
        while self.claimed.contains(&self.cursor) {
            self.cursor += 1;
        }
        let slot = self.cursor;
        self.claimed.insert(slot);
        slot
    }
}

/// Every selector used more than once, in order of first appearance.
fn find_duplicates(tasks: &[UploadTask]) -> Vec<WorksheetSelector> {
    let mut counts: HashMap<&WorksheetSelector, usize> = HashMap::new();
    for task in tasks {
        *counts.entry(&task.selector).or_insert(0) += 1;
    }

    let mut duplicates: Vec<WorksheetSelector> = Vec::new();
    for task in tasks {
        if counts[&task.selector] > 1 && !duplicates.contains(&task.selector) {
            duplicates.push(task.selector.clone());
        }
    }
    duplicates
}

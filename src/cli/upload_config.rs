// Everything the run needs, resolved once at startup. Defaults that depend on the
// environment (home directory, env vars via clap) are settled here and nowhere else.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::args::Cli;
use crate::infra::google_sheets::{extract_spreadsheet_id, ValueInputOption};

const DEFAULT_SECRETS_FILE: &str = ".google-apis.json";
const DEFAULT_TOKEN_CACHE_FILE: &str = ".google-apis.token.json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("'{0}' is neither a spreadsheet ID nor a spreadsheet URL")]
    InvalidSpreadsheet(String),
    #[error("Delimiter must be a single ASCII character, got '{0}'")]
    InvalidDelimiter(char),
    #[error("Cannot locate the home directory; pass --secrets and --token-cache explicitly")]
    NoHomeDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub spreadsheet_id: String,
    pub files: Vec<String>,
    pub secrets_path: PathBuf,
    pub token_cache_path: PathBuf,
    /// Bare filenames target a worksheet named after the file.
    pub name_by_filename: bool,
    pub value_input: ValueInputOption,
    pub delimiter: u8,
    pub dry_run: bool,
}

impl UploadConfig {
    pub fn from_cli(cli: Cli, home_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let spreadsheet_id = extract_spreadsheet_id(&cli.spreadsheet)
            .ok_or_else(|| ConfigError::InvalidSpreadsheet(cli.spreadsheet.clone()))?;

        if !cli.delimiter.is_ascii() {
            return Err(ConfigError::InvalidDelimiter(cli.delimiter));
        }

        let secrets_path = default_path(cli.secrets, home_dir, DEFAULT_SECRETS_FILE)?;
        let token_cache_path = default_path(cli.token_cache, home_dir, DEFAULT_TOKEN_CACHE_FILE)?;

        Ok(Self {
            spreadsheet_id,
            files: cli.files,
            secrets_path,
            token_cache_path,
            name_by_filename: !cli.no_names,
            value_input: if cli.raw {
                ValueInputOption::Raw
            } else {
                ValueInputOption::UserEntered
            },
            delimiter: cli.delimiter as u8,
            dry_run: cli.dry_run,
        })
    }
}

fn default_path(
    explicit: Option<PathBuf>,
    home_dir: Option<&Path>,
    file_name: &str,
) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(path) => Ok(path),
        None => home_dir
            .map(|home| home.join(file_name))
            .ok_or(ConfigError::NoHomeDir),
    }
}

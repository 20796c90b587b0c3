use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "upload-to-sheets",
    version,
    about = "Upload CSV files into the worksheets of a Google Spreadsheet",
    long_about = "Upload CSV files into the worksheets of a Google Spreadsheet.\n\n\
        Each file is given as `filename[:sheet]`, where sheet is a 1-based worksheet index \
        or a worksheet title. The target worksheet is created when missing, resized to the \
        CSV's extent and fully overwritten."
)]
pub struct Cli {
    /// Spreadsheet ID or its full docs.google.com URL
    pub spreadsheet: String,

    /// Files to upload, as `filename[:sheet]`
    #[arg(required = true)]
    pub files: Vec<String>,

    /// OAuth client secrets or service account key [default: ~/.google-apis.json]
    #[arg(long, env = "GOOGLE_CLIENT_SECRETS")]
    pub secrets: Option<PathBuf>,

    /// Where to cache OAuth tokens [default: ~/.google-apis.token.json]
    #[arg(long, env = "GOOGLE_TOKEN_CACHE")]
    pub token_cache: Option<PathBuf>,

    /// Don't name worksheets after bare filenames; fill the lowest free sheet slots instead
    #[arg(long)]
    pub no_names: bool,

    /// Store values verbatim instead of parsing numbers, dates and formulas
    #[arg(long)]
    pub raw: bool,

    /// CSV field delimiter
    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    /// Read and validate everything, but don't touch the spreadsheet
    #[arg(long)]
    pub dry_run: bool,
}

// CLI layer - argument parsing and the run configuration.

#[path = "args.rs"]
pub mod args;

#[path = "upload_config.rs"]
pub mod config;

pub use args::Cli;
pub use config::UploadConfig;

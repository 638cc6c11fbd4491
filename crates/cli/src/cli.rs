//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use crate::error::CliError;

/// Default `--batch-size` value
const DEFAULT_BATCH_SIZE: &str = "256KB";

/// Event Uploader - streams JSON lines events into size-bounded batches
#[derive(Parser, Debug)]
#[command(
    name = "event-uploader",
    author,
    version,
    about = "Batched event uploader",
    long_about = "Reads newline-delimited JSON events, groups them into batches bounded by\n\
                  record count and estimated size, and forwards every batch to the\n\
                  configured delivery client under a single run root."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EVENT_UPLOADER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "EVENT_UPLOADER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload an events file
    Run(RunArgs),

    /// Validate a configuration directory without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Events file, one JSON object per line (.jsonl)
    #[arg(short, long, value_parser = parse_events_file, env = "EVENT_UPLOADER_EVENTS_FILE")]
    pub events_file: PathBuf,

    /// Directory holding box.json and optional uploader.toml / uploader.json
    #[arg(short, long, value_parser = parse_config_dir, env = "EVENT_UPLOADER_CONFIG_DIR")]
    pub config_dir: PathBuf,

    /// Maximum records per batch
    #[arg(
        short = 'n',
        long,
        default_value = "300",
        value_parser = parse_batch_count,
        env = "EVENT_UPLOADER_BATCH_COUNT"
    )]
    pub batch_count: usize,

    /// Maximum estimated batch size (bare bytes, or with a B / KB suffix)
    #[arg(
        long,
        default_value = DEFAULT_BATCH_SIZE,
        value_parser = parse_batch_size,
        env = "EVENT_UPLOADER_BATCH_SIZE"
    )]
    pub batch_size: usize,

    /// Book the events are uploaded to (defaults to bookName from box.json)
    #[arg(short, long, value_parser = parse_not_blank, env = "EVENT_UPLOADER_BOOK")]
    pub book: Option<String>,

    /// Scope of the events (defaults to boxName from box.json)
    #[arg(short, long, value_parser = parse_not_blank, env = "EVENT_UPLOADER_SCOPE")]
    pub scope: Option<String>,

    /// Capacity of the record queue (overrides the configuration file)
    #[arg(long, value_parser = parse_buffer_size, env = "EVENT_UPLOADER_READ_BUFFER_SIZE")]
    pub read_buffer_size: Option<usize>,

    /// Capacity of the batch queue (overrides the configuration file)
    #[arg(long, value_parser = parse_buffer_size, env = "EVENT_UPLOADER_BATCH_BUFFER_SIZE")]
    pub batch_buffer_size: Option<usize>,

    /// Label of the run root (defaults to "Root event <now>")
    #[arg(long, env = "EVENT_UPLOADER_ROOT_LABEL")]
    pub root_label: Option<String>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "EVENT_UPLOADER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate arguments and configuration and exit without uploading
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Configuration directory to validate
    #[arg(short, long, default_value = ".", env = "EVENT_UPLOADER_CONFIG_DIR")]
    pub config_dir: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

fn parse_events_file(value: &str) -> Result<PathBuf, CliError> {
    let path = PathBuf::from(value);
    if !path.is_file() {
        return Err(CliError::invalid_argument(
            "events-file",
            format!("{} is not an existing file", path.display()),
        ));
    }
    if !has_jsonl_extension(&path) {
        return Err(CliError::invalid_argument(
            "events-file",
            format!("{} must have the .jsonl extension", path.display()),
        ));
    }
    Ok(path)
}

fn has_jsonl_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"))
}

fn parse_config_dir(value: &str) -> Result<PathBuf, CliError> {
    let path = PathBuf::from(value);
    if !path.is_dir() {
        return Err(CliError::invalid_argument(
            "config-dir",
            format!("{} is not a directory", path.display()),
        ));
    }
    Ok(path)
}

fn parse_positive(name: &str, value: &str) -> Result<usize, CliError> {
    let parsed: usize = value
        .trim()
        .parse()
        .map_err(|_| CliError::invalid_argument(name, format!("'{value}' is not a number")))?;
    if parsed == 0 {
        return Err(CliError::invalid_argument(name, "must be > 0"));
    }
    Ok(parsed)
}

fn parse_batch_count(value: &str) -> Result<usize, CliError> {
    parse_positive("batch-count", value)
}

fn parse_buffer_size(value: &str) -> Result<usize, CliError> {
    parse_positive("buffer-size", value)
}

fn parse_batch_size(value: &str) -> Result<usize, CliError> {
    config_loader::parse_byte_size(value)
        .map_err(|e| CliError::invalid_argument("batch-size", e.to_string()))
}

fn parse_not_blank(value: &str) -> Result<String, CliError> {
    if value.trim().is_empty() {
        return Err(CliError::invalid_argument("book/scope", "must not be blank"));
    }
    Ok(value.to_string())
}

//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use tabfetch::detect::DEFAULT_MAX_COLUMNS;
use tabfetch::download::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use tabfetch::{DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS};

/// Download the images linked from spreadsheet columns.
///
/// Every `.xlsx` workbook under INPUT_DIR is scanned; the columns that look
/// like image links (or the ones named with --columns) are downloaded into
/// `<OUTPUT_DIR>/<workbook name> (<link count>)`.
#[derive(Parser, Debug, Clone)]
#[command(name = "tabfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Directory searched recursively for `.xlsx` workbooks
    pub input_dir: PathBuf,

    /// Directory receiving one folder per workbook (defaults to INPUT_DIR)
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Only process workbooks whose file name contains this text
    #[arg(short = 'n', long)]
    pub name_filter: Option<String>,

    /// Download from these header names instead of detecting URL columns (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Maximum number of detected URL columns per workbook (1-50)
    #[arg(long, default_value_t = DEFAULT_MAX_COLUMNS as u8, value_parser = clap::value_parser!(u8).range(1..=50))]
    pub max_columns: u8,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Attempts per link, including the first (1-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_ATTEMPTS as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_attempts: u8,

    /// Append `_<index>` to file names shared by several links instead of overwriting
    #[arg(long)]
    pub disambiguate: bool,

    /// HTTP connect timeout in seconds (1-3600)
    #[arg(long, default_value_t = CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: u64,

    /// Seconds a download may go without receiving data (1-3600)
    #[arg(long, default_value_t = READ_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: u64,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored log output (also honors NO_COLOR)
    #[arg(long)]
    pub no_color: bool,
}

//! CLI argument definitions for arcdata.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fred` | Economic series observations |
//! | `statcan` | Statistics Canada vector observations |
//! | `stock` | Daily-or-coarser equity bars for one or more tickers |
//! | `edgar` | Raw SEC filing documents |
//! | `cache` | Inspect the local store |
//! | `scheduler` | Refresh everything the store knows about |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `table` | Output format (table, csv, json) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--no-cache` | `false` | Always fetch remotely and refresh the store |
//! | `--home` | `$ARCDATA_HOME` | Root directory for local state |
//! | `--timeout-ms` | `$ARCDATA_HTTP_TIMEOUT_MS` | Per-request HTTP timeout |
//! | `-v` | off | `-v` logs at info, `-vv` at debug |

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "arcdata",
    author,
    version,
    about = "Read-through cache for economic, statistical and equity time series"
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Skip the cache lookup; fetch remotely and store the result.
    #[arg(long, global = true, default_value_t = false)]
    pub no_cache: bool,

    /// Root directory for local state (overrides ARCDATA_HOME).
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Per-request HTTP timeout in milliseconds (overrides ARCDATA_HTTP_TIMEOUT_MS).
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Increase log verbosity on stderr.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text columns.
    Table,
    /// Comma-separated values with a header row.
    Csv,
    /// One JSON object with `meta` and `data`.
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch FRED observations for a series id.
    ///
    ///   arcdata fred CPIAUCSL --start 2020-01-01
    Fred(SeriesArgs),

    /// Fetch Statistics Canada observations for a vector id.
    ///
    ///   arcdata statcan v41690973
    Statcan(SeriesArgs),

    /// Fetch OHLCV bars for one or more tickers.
    ///
    ///   arcdata stock MSFT AAPL --interval 1wk --columns close,volume
    Stock(StockArgs),

    /// Fetch raw SEC EDGAR filing documents.
    Edgar(EdgarArgs),

    /// Inspect the local store.
    Cache(CacheArgs),

    /// Refresh cached series and instruments.
    Scheduler(SchedulerArgs),
}

#[derive(Debug, Args)]
pub struct SeriesArgs {
    /// Provider identifier of the series.
    pub key: String,

    /// First date to return (YYYY-MM-DD, YYYY-MM or YYYY).
    #[arg(long)]
    pub start: Option<String>,

    /// Last date to return, inclusive.
    #[arg(long)]
    pub end: Option<String>,
}

#[derive(Debug, Args)]
pub struct StockArgs {
    /// One or more ticker symbols.
    #[arg(required = true, num_args = 1..)]
    pub tickers: Vec<String>,

    /// Bar interval: 1d, 5d, 1wk, 1mo or 3mo.
    #[arg(long, default_value = "1d")]
    pub interval: String,

    #[arg(long)]
    pub start: Option<String>,

    #[arg(long)]
    pub end: Option<String>,

    /// Comma-separated subset of open,high,low,close,volume,dividends,splits.
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,
}

#[derive(Debug, Args)]
pub struct EdgarArgs {
    #[command(subcommand)]
    pub command: EdgarCommand,
}

#[derive(Debug, Subcommand)]
pub enum EdgarCommand {
    /// XBRL company facts.
    Facts(FilingArgs),
    /// Filing history.
    Submissions(FilingArgs),
}

#[derive(Debug, Args)]
pub struct FilingArgs {
    /// Ticker symbol or CIK.
    pub ticker_or_cik: String,
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// List stored series and instruments.
    List {
        /// Only series from this source (fred, statcan, yahoo or a canonical name).
        #[arg(long)]
        source: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct SchedulerArgs {
    #[command(subcommand)]
    pub command: SchedulerCommand,
}

#[derive(Debug, Subcommand)]
pub enum SchedulerCommand {
    /// Run one refresh pass and print its report.
    Once,
    /// Refresh once a day at a fixed UTC time until interrupted.
    Run {
        /// Time of day in UTC, HH:MM.
        #[arg(long, default_value = "06:00")]
        at: String,
    },
}

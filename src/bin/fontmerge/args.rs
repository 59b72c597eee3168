//! Command-line arguments of `fontmerge`.
//!
//! Verbosity comes from `-v`/`-q`, an explicit `--verbose-level`, or `RUST_LOG`, which
//! wins over both when it is set.
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

/// Merge an Arabic font and a Latin font into one TrueType font
///
/// The Arabic font contributes the Arabic script blocks and the Latin font the printable
/// ASCII range. The merged font is written to `<out-dir>/merged`, two JPEG previews to
/// `<out-dir>/previews` and a log of the run to `<out-dir>/logs`.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct FontMergeArgs {
    /// Path to the font providing the Arabic glyphs
    #[arg(long, value_name = "PATH")]
    pub arabic: PathBuf,

    /// Path to the font providing the Latin glyphs
    #[arg(long, value_name = "PATH")]
    pub latin: PathBuf,

    /// Base directory for the merged font, previews and logs
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Configuration file; `fontmergerc.toml` is looked up when not given
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print machine readable results and exit with status 1 when the merge fails
    #[arg(long)]
    pub automation: bool,

    /// Directory for the job's scratch files (the system temp dir by default)
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// More output: -v shows each stage's details, -vv everything
    #[arg(short, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only report errors
    #[arg(short)]
    pub quiet: bool,

    /// Exact log level (off, error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    pub verbose_level: Option<LevelFilter>,
}

/// Where the terminal log filter comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFilter {
    /// `RUST_LOG` directives, parsed by `env_logger`
    Directives(String),
    Level(LevelFilter),
}

impl FontMergeArgs {
    /// The log filter for this run, given the value of `RUST_LOG`
    pub fn log_filter(&self, rust_log: Option<String>) -> LogFilter {
        if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
            return LogFilter::Directives(directives);
        }
        let level = self.verbose_level.unwrap_or(match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::Error,
            (false, 0) => LevelFilter::Info,
            (false, 1) => LevelFilter::Debug,
            (false, _) => LevelFilter::Trace,
        });
        LogFilter::Level(level)
    }
}

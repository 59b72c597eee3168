//! Terminal output of the `log` facade.
//!
//! Events go to stderr as `level: message`, so stdout stays free for the summary and the
//! `key=value` lines of automation mode. Debug and trace events also name their module.
use crate::args::{FontMergeArgs, LogFilter};
use env_logger::{Builder, Target};
use log::{Level, SetLoggerError};
use std::io::Write;

pub fn init_logging(args: &FontMergeArgs) -> Result<(), SetLoggerError> {
    let mut builder = Builder::new();
    match args.log_filter(std::env::var("RUST_LOG").ok()) {
        LogFilter::Directives(directives) => builder.parse_filters(&directives),
        LogFilter::Level(level) => builder.filter_level(level),
    };
    builder
        .target(Target::Stderr)
        .format(|buf, record| {
            let level = record.level().as_str().to_lowercase();
            if record.level() >= Level::Debug {
                writeln!(buf, "{}: [{}] {}", level, record.target(), record.args())
            } else {
                writeln!(buf, "{}: {}", level, record.args())
            }
        })
        .try_init()
}

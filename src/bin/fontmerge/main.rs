/// Font merge binary entry point
///
/// Merges the Arabic glyphs of one font with the Latin glyphs of another and renders
/// light and dark previews of the result.
///
/// # Examples
///
/// Basic usage:
/// ```sh
/// cargo run --bin fontmerge -- --arabic fonts/Amiri.ttf --latin fonts/DejaVuSans.ttf --out-dir out
/// ```
///
/// From a script, with a status code and one `key=value` line per output:
/// ```sh
/// cargo run --bin fontmerge -- --automation -q --arabic a.otf --latin b.ttf
/// ```
use clap::Parser;
use fontmerge::config::{discover_config, load_config_from_source, ConfigSource, MergeConfig};
use fontmerge::job::{run_job, JobReport, JobRequest};
use log::{debug, error, info};
use std::process;

mod args;
mod logging;

use args::FontMergeArgs;
use logging::init_logging;

fn main() {
    let args = FontMergeArgs::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    debug!("Parsed arguments: {:?}", args);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let mut request = JobRequest::new(&args.arabic, &args.latin, &args.out_dir);
    if let Some(dir) = &args.work_dir {
        request = request.with_work_root(dir);
    }
    let report = run_job(&request, &config);

    if args.automation {
        print_automation(&report);
        if !report.success {
            process::exit(1);
        }
    } else {
        println!("{}", report.summary);
        if let Some(log) = &report.log {
            info!("Log written to {}", log.display());
        }
    }
}

fn load_config(args: &FontMergeArgs) -> Result<MergeConfig, Box<dyn std::error::Error>> {
    let path = args.config.clone().or_else(discover_config);
    let config = match &path {
        Some(path) => {
            let path = path.to_string_lossy();
            debug!("Loading configuration from {}", path);
            load_config_from_source(ConfigSource::File(&path))?
        }
        None => load_config_from_source(ConfigSource::Default)?,
    };
    Ok(config)
}

fn print_automation(report: &JobReport) {
    println!("status={}", if report.success { "ok" } else { "failed" });
    if let Some(font) = &report.font {
        println!("font={}", font.display());
    }
    for preview in &report.previews {
        println!("preview={}", preview.display());
    }
    if let Some(log) = &report.log {
        println!("log={}", log.display());
    }
    if !report.success {
        eprintln!("{}", report.summary);
    }
}

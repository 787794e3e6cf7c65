//! Console and per-clone file logging.
//!
//! The console shows WARN and above unless `--debug-level` says otherwise, so
//! the workflow milestones are always visible. When a log directory is given,
//! everything down to DEBUG also goes to `<dir>/<NAME>_Clone_<timestamp>.log`.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

/// Maps the operator's level names onto tracing levels. CRITICAL has no
/// tracing counterpart and is treated as ERROR.
pub fn parse_level(debug_level: &str) -> Result<LevelFilter> {
    match debug_level.trim().to_ascii_uppercase().as_str() {
        "DEBUG" => Ok(LevelFilter::DEBUG),
        "INFO" => Ok(LevelFilter::INFO),
        "WARNING" | "WARN" => Ok(LevelFilter::WARN),
        "ERROR" | "CRITICAL" => Ok(LevelFilter::ERROR),
        other => Err(anyhow::anyhow!(
            "Unknown debug level '{}'. Use DEBUG, INFO, WARNING, ERROR or CRITICAL",
            other
        )),
    }
}

pub fn log_file_name(new_name: &str, started: DateTime<Local>) -> String {
    format!("{}_Clone_{}.log", new_name, started.format("%Y%m%d-%H%M%S"))
}

/// Console layer at `debug_level`, plus a DEBUG file layer when `log_dir` is set.
pub fn build_subscriber(
    debug_level: &str,
    log_dir: Option<&Path>,
    new_name: &str,
) -> Result<(impl Subscriber + Send + Sync + 'static, Option<PathBuf>)> {
    let console_level = parse_level(debug_level)?;
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_level);

    let (file_layer, log_file) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let path = dir.join(log_file_name(new_name, Local::now()));
            let file = File::create(&path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(LevelFilter::DEBUG);
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry().with(console).with(file_layer);
    Ok((subscriber, log_file))
}

/// Installs the global subscriber. Returns the log file path when one is written.
pub fn init_logging(debug_level: &str, log_dir: Option<&Path>, new_name: &str) -> Result<Option<PathBuf>> {
    let (subscriber, log_file) = build_subscriber(debug_level, log_dir, new_name)?;
    tracing::subscriber::set_global_default(subscriber).context("Logging was already initialised")?;
    Ok(log_file)
}

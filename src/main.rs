//! Oracle Database Clone Tool
//!
//! Live mounts backup files from the backup platform and duplicates the
//! source database onto this host under a new name.

// dbclonetool/src/main.rs
mod clone;
mod config;
mod engine;
mod errors;
mod platform;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use config::{AppConfig, CliArgs};
use std::process::ExitCode;
use clone::UnmountOutcome;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(_) => {
            println!("✅ Database clone completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    dotenv::dotenv().ok();
    let args = CliArgs::parse();
    let app_config = AppConfig::from_args(args).context("Invalid clone parameters")?;

    let log_file = utils::logging::init_logging(
        &app_config.debug_level,
        app_config.log_path.as_deref(),
        &app_config.request.new_name,
    )?;
    if let Some(path) = log_file {
        info!("Logging to {}", path.display());
    }
    app_config.log_summary();

    let outcome = clone::run_clone_flow(&app_config)
        .await
        .context("Clone process failed")?;
    debug!("Duplicate script used: {}", outcome.script);
    info!(
        "Recovery point {} ms ({:?}), ORACLE_HOME {}",
        outcome.time.epoch_ms,
        outcome.time.source,
        outcome.oracle_home.display()
    );
    println!(
        "🗄️ {} duplicated from {} (mount id {}).",
        outcome.new_name, app_config.request.source_db, outcome.mount.mount_id
    );
    if let UnmountOutcome::Failed(reason) = &outcome.unmount {
        println!(
            "⚠️ Live mount {} was not removed ({}). Unmount it from the backup platform.",
            outcome.mount.mount_id, reason
        );
    }
    Ok(())
}

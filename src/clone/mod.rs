mod logic;
pub(crate) mod resolution; // Target and recovery time resolution
pub(crate) mod live_mount; // Mount, poll and unmount of backup files
pub(crate) mod discovery; // Finding the directory a mount created
pub(crate) mod bootstrap; // Auxiliary instance startup
pub(crate) mod script; // Duplicate script builder
pub(crate) mod executor; // Running the duplicate script
#[cfg(test)]
pub(crate) mod fakes;

use chrono::NaiveDateTime;
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::engine::oracle_cli::OracleCli;
use crate::errors::{CloneError, Result};
use crate::platform::rest::RestPlatform;

pub use logic::{CloneOrchestrator, CloneOutcome, UnmountOutcome};

pub const MAX_INSTANCE_NAME_LEN: usize = 8;

/// Optional file relocation overrides. Values are substituted verbatim into
/// the duplicate script, so quoting is the caller's responsibility.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationDirectives {
    pub control_files: Option<String>,
    pub db_file_name_convert: Option<String>,
    pub log_file_name_convert: Option<String>,
    pub audit_file_dest: Option<String>,
    pub core_dump_dest: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClonePolicy {
    pub skip_parameter_file: bool,
    pub no_file_name_check: bool,
    pub refresh_existing: bool,
}

/// Everything a clone run needs, fixed for the duration of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneRequest {
    pub source_host: String,
    pub source_db: String,
    pub target_host: String,
    pub new_name: String,
    pub mount_path: PathBuf,
    pub time_restore: Option<NaiveDateTime>,
    pub oracle_home: Option<PathBuf>,
    pub parallelism: u32,
    pub relocation: RelocationDirectives,
    pub policy: ClonePolicy,
}

impl CloneRequest {
    /// Checks that need no remote or local state. Runs before anything else.
    pub fn validate(&self) -> Result<()> {
        if self.new_name.trim().is_empty() {
            return Err(CloneError::InvalidInput("The new oracle name cannot be empty.".to_string()));
        }
        if self.new_name.chars().count() > MAX_INSTANCE_NAME_LEN {
            return Err(CloneError::InvalidInput(format!(
                "The new oracle name: {} is too long. Oracle names must be {} characters or less.",
                self.new_name, MAX_INSTANCE_NAME_LEN
            )));
        }
        if self.new_name.eq_ignore_ascii_case(&self.source_db) {
            return Err(CloneError::InvalidInput(format!(
                "The new oracle db name {} cannot be the same as the source db name {}",
                self.new_name, self.source_db
            )));
        }
        if self.policy.refresh_existing && !self.policy.no_file_name_check {
            return Err(CloneError::InvalidInput(
                "Refreshing an existing database requires no_file_name_check.".to_string(),
            ));
        }
        if self.parallelism == 0 {
            return Err(CloneError::InvalidInput("Parallelism must be at least 1.".to_string()));
        }
        Ok(())
    }
}

/// Public entry point for the clone process.
pub async fn run_clone_flow(app_config: &AppConfig) -> anyhow::Result<CloneOutcome> {
    let connection = crate::config::PlatformConnection::from_env()?;
    let platform = RestPlatform::connect(&connection)?;
    let engine = OracleCli;
    let orchestrator = CloneOrchestrator::new(&platform, &engine);
    Ok(orchestrator.run(&app_config.request).await?)
}

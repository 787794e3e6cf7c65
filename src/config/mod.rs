// dbclonetool/src/config/mod.rs
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, SubsecRound};
use clap::Parser;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::clone::{ClonePolicy, CloneRequest, RelocationDirectives};
use crate::errors::CloneError;

pub const DEFAULT_PARALLELISM: u32 = 4;

/// Command line surface. Every optional parameter can also come from the
/// configuration file, which wins over the command line.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dbclonetool",
    version,
    about = "Clone an Oracle database from live mounted backup files"
)]
pub struct CliArgs {
    /// The source <host or RAC cluster>:<database>
    #[arg(short = 's', long)]
    pub source_host_db: String,
    /// The path used to mount the backup files. The duplicate reads from the
    /// directory the live mount creates under this path
    #[arg(short = 'm', long)]
    pub mount_path: PathBuf,
    /// Name for the cloned database (8 characters or less)
    #[arg(short = 'n', long)]
    pub new_oracle_name: String,
    /// JSON configuration file for any of the optional parameters
    #[arg(short = 'f', long)]
    pub configuration_file: Option<PathBuf>,
    /// Point in time for the clone, ISO 8601 (2019-04-30T18:23:21)
    #[arg(short = 't', long)]
    pub time_restore: Option<String>,
    /// ORACLE_HOME for the clone, defaults to the source database's home
    #[arg(short = 'o', long)]
    pub oracle_home: Option<PathBuf>,
    /// Degree of parallelism for the duplicate
    #[arg(short = 'p', long, default_value_t = DEFAULT_PARALLELISM)]
    pub parallelism: u32,
    /// Start the auxiliary instance from a minimal init file and keep the source parameters
    #[arg(long)]
    pub no_spfile: bool,
    /// Do not check for existing files at the destination. Potentially destructive
    #[arg(long)]
    pub no_file_name_check: bool,
    /// Refresh an existing database. Requires --no-file-name-check
    #[arg(long)]
    pub refresh_db: bool,
    #[arg(long)]
    pub control_files: Option<String>,
    #[arg(long)]
    pub db_file_name_convert: Option<String>,
    #[arg(long)]
    pub log_file_name_convert: Option<String>,
    #[arg(long)]
    pub audit_file_dest: Option<String>,
    #[arg(long)]
    pub core_dump_dest: Option<String>,
    /// Log directory, no log file is written when absent
    #[arg(short = 'l', long)]
    pub log_path: Option<PathBuf>,
    /// Console level: DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[arg(short = 'd', long, default_value = "WARNING")]
    pub debug_level: String,
    /// Host the backups are mounted on, defaults to this host
    #[arg(long)]
    pub target_host: Option<String>,
}

// Configuration file layout. Flags accept JSON booleans or "true"/"false".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub parallelism: Option<serde_json::Value>,
    pub no_spfile: Option<serde_json::Value>,
    pub no_file_name_check: Option<serde_json::Value>,
    pub refresh_db: Option<serde_json::Value>,
    pub time_restore: Option<String>,
    pub oracle_home: Option<PathBuf>,
    pub control_files: Option<String>,
    pub db_file_name_convert: Option<String>,
    pub log_file_name_convert: Option<String>,
    pub audit_file_dest: Option<String>,
    pub core_dump_dest: Option<String>,
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformAuth {
    Token(String),
    Basic { username: String, password: String },
}

/// Backup platform connection settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConnection {
    pub node: String,
    pub auth: PlatformAuth,
    pub verify_tls: bool,
}

impl PlatformConnection {
    pub fn from_env() -> Result<Self> {
        let node = env::var("RUBRIK_CDM_NODE_IP").context("RUBRIK_CDM_NODE_IP must be set")?;
        let auth = match env::var("RUBRIK_CDM_TOKEN") {
            Ok(token) if !token.trim().is_empty() => PlatformAuth::Token(token),
            _ => PlatformAuth::Basic {
                username: env::var("RUBRIK_CDM_USERNAME")
                    .context("RUBRIK_CDM_TOKEN or RUBRIK_CDM_USERNAME must be set")?,
                password: env::var("RUBRIK_CDM_PASSWORD")
                    .context("RUBRIK_CDM_PASSWORD must be set when using RUBRIK_CDM_USERNAME")?,
            },
        };
        let verify_tls = match env::var("RUBRIK_CDM_VERIFY_TLS") {
            Ok(value) => parse_bool_str("RUBRIK_CDM_VERIFY_TLS", &value)?,
            Err(_) => false,
        };
        Ok(Self { node, auth, verify_tls })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub request: CloneRequest,
    pub log_path: Option<PathBuf>,
    pub debug_level: String,
    /// Values read from `--configuration-file`, kept for the run log.
    pub file_parameters: Option<RawJsonConfig>,
}

impl AppConfig {
    /// Merges the configuration file (if any) over the command line and builds
    /// the clone request.
    pub fn from_args(mut args: CliArgs) -> Result<Self> {
        let file_parameters = match args.configuration_file.clone() {
            Some(config_path) => {
                let raw = load_raw_config(&config_path)?;
                apply_file_overrides(&mut args, raw.clone())?;
                Some(raw)
            }
            None => None,
        };

        let target_host = match args.target_host.clone() {
            Some(host) => host,
            None => crate::utils::local_short_hostname()?,
        };

        let (source_host, source_db) = split_source_host_db(&args.source_host_db)?;
        let time_restore = args
            .time_restore
            .as_deref()
            .map(parse_restore_time)
            .transpose()?;

        let request = CloneRequest {
            source_host,
            source_db,
            target_host,
            new_name: args.new_oracle_name,
            mount_path: args.mount_path,
            time_restore,
            oracle_home: args.oracle_home,
            parallelism: args.parallelism,
            relocation: RelocationDirectives {
                control_files: args.control_files,
                db_file_name_convert: args.db_file_name_convert,
                log_file_name_convert: args.log_file_name_convert,
                audit_file_dest: args.audit_file_dest,
                core_dump_dest: args.core_dump_dest,
            },
            policy: ClonePolicy {
                skip_parameter_file: args.no_spfile,
                no_file_name_check: args.no_file_name_check,
                refresh_existing: args.refresh_db,
            },
        };

        Ok(AppConfig {
            request,
            log_path: args.log_path,
            debug_level: args.debug_level,
            file_parameters,
        })
    }

    /// Logs how the request was assembled. Runs once logging is installed.
    pub fn log_summary(&self) {
        if let Some(raw) = &self.file_parameters {
            debug!("Parameters for duplicate loaded from file: {:?}", raw);
        }
        debug!("The hostname used for the target host is {}", self.request.target_host);
    }
}

pub fn load_raw_config(config_path: &Path) -> Result<RawJsonConfig> {
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
    let raw: RawJsonConfig = serde_json::from_str(&content).with_context(|| {
        format!("Failed to parse JSON from config file at {}", config_path.display())
    })?;
    Ok(raw)
}

/// Values present in the file replace the command line values.
fn apply_file_overrides(args: &mut CliArgs, raw: RawJsonConfig) -> Result<()> {
    if let Some(value) = raw.parallelism {
        args.parallelism = parse_u32("parallelism", &value)?;
    }
    if let Some(value) = raw.no_spfile {
        args.no_spfile = parse_bool("no_spfile", &value)?;
    }
    if let Some(value) = raw.no_file_name_check {
        args.no_file_name_check = parse_bool("no_file_name_check", &value)?;
    }
    if let Some(value) = raw.refresh_db {
        args.refresh_db = parse_bool("refresh_db", &value)?;
    }
    args.time_restore = raw.time_restore.or(args.time_restore.take());
    args.oracle_home = raw.oracle_home.or(args.oracle_home.take());
    args.control_files = raw.control_files.or(args.control_files.take());
    args.db_file_name_convert = raw.db_file_name_convert.or(args.db_file_name_convert.take());
    args.log_file_name_convert = raw.log_file_name_convert.or(args.log_file_name_convert.take());
    args.audit_file_dest = raw.audit_file_dest.or(args.audit_file_dest.take());
    args.core_dump_dest = raw.core_dump_dest.or(args.core_dump_dest.take());
    args.log_path = raw.log_path.or(args.log_path.take());
    Ok(())
}

fn parse_bool(key: &str, value: &serde_json::Value) -> Result<bool, CloneError> {
    match value {
        serde_json::Value::Bool(b) => Ok(*b),
        serde_json::Value::String(s) => parse_bool_str(key, s),
        other => Err(CloneError::Config(format!("{} must be true or false, got {}", key, other))),
    }
}

fn parse_bool_str(key: &str, value: &str) -> Result<bool, CloneError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(CloneError::Config(format!("{} must be true or false, got '{}'", key, other))),
    }
}

fn parse_u32(key: &str, value: &serde_json::Value) -> Result<u32, CloneError> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        CloneError::Config(format!("{} must be a positive whole number, got {}", key, value))
    })
}

/// Splits `host:database`.
pub fn split_source_host_db(source_host_db: &str) -> Result<(String, String), CloneError> {
    match source_host_db.split_once(':') {
        Some((host, db)) if !host.trim().is_empty() && !db.trim().is_empty() => {
            Ok((host.trim().to_string(), db.trim().to_string()))
        }
        _ => Err(CloneError::InvalidInput(format!(
            "The source must be given as <host>:<database>, got '{}'",
            source_host_db
        ))),
    }
}

/// Parses an ISO 8601 local timestamp such as `2019-04-30T18:23:21`.
/// Fractional seconds are dropped so the mounted point and the until-time
/// bound of the duplicate are the same second.
pub fn parse_restore_time(value: &str) -> Result<NaiveDateTime, CloneError> {
    const FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value.trim(), fmt).ok())
        .map(|time| time.trunc_subsecs(0))
        .ok_or_else(|| {
            CloneError::InvalidInput(format!(
                "The restore time '{}' is not in ISO 8601 format (2019-04-30T18:23:21)",
                value
            ))
        })
}

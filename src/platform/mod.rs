//! Backup platform capabilities consumed by the clone workflow.
//!
//! The workflow only talks to the platform through [`BackupPlatform`], so the
//! REST client in [`rest`] can be swapped for an in-memory fake in tests.

pub(crate) mod rest;

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::errors::Result;

/// Opaque identifier of the host or cluster the backup files are mounted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget(pub String);

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata the platform holds about the source database.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseMetadata {
    pub id: String,
    pub oracle_home: Option<String>,
    pub latest_recovery_point: Option<String>,
    #[serde(default)]
    pub rac_name: Option<String>,
}

impl DatabaseMetadata {
    /// True when the source ran on a clustered configuration.
    pub fn is_clustered(&self) -> bool {
        self.rac_name.as_deref().is_some_and(|name| !name.trim().is_empty())
    }
}

/// Lifecycle states reported for an asynchronous platform request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Acquiring,
    Running,
    Finishing,
    Succeeded,
    Failed,
    Canceled,
    Canceling,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled)
    }
}

/// Reference to a long-running platform operation, observable only by polling.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AsyncJobHandle {
    pub id: String,
    pub status: JobStatus,
}

/// A single poll result for an asynchronous request.
#[derive(Debug, Clone, Deserialize)]
pub struct JobState {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[async_trait]
pub trait BackupPlatform: Send + Sync {
    /// Version string of the platform, e.g. `5.1.2-p3-2319`.
    async fn cluster_version(&self) -> Result<String>;

    /// IANA name of the timezone the platform is configured in.
    async fn cluster_timezone(&self) -> Result<String>;

    async fn database_metadata(&self, host: &str, db_name: &str) -> Result<DatabaseMetadata>;

    /// Unified lookup available from 5.2.1 onwards.
    async fn resolve_target(&self, hostname: &str) -> Result<ResolvedTarget>;

    async fn resolve_host_target(&self, hostname: &str) -> Result<ResolvedTarget>;

    async fn resolve_rac_target(&self, hostname: &str) -> Result<ResolvedTarget>;

    async fn request_live_mount(
        &self,
        db_id: &str,
        target: &ResolvedTarget,
        time_ms: i64,
        files_only: bool,
        mount_path: &Path,
    ) -> Result<AsyncJobHandle>;

    async fn poll_job(&self, job_id: &str) -> Result<JobState>;

    async fn request_unmount(&self, mount_id: &str) -> Result<AsyncJobHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_status_parses_platform_strings() -> anyhow::Result<()> {
        let state: JobState = serde_json::from_value(json!({"id": "MOUNT_1", "status": "SUCCEEDED"}))?;
        assert_eq!(state.status, JobStatus::Succeeded);
        assert!(state.status.is_terminal());

        let state: JobState = serde_json::from_value(json!({"id": "MOUNT_1", "status": "UNDO_TASK"}))?;
        assert_eq!(state.status, JobStatus::Unknown);
        assert!(!state.status.is_terminal());
        Ok(())
    }

    #[test]
    fn test_metadata_clustered_only_with_non_empty_rac_name() -> anyhow::Result<()> {
        let single: DatabaseMetadata = serde_json::from_value(json!({
            "id": "OracleDatabase:::1",
            "oracleHome": "/u01/app/oracle/product/19c",
            "latestRecoveryPoint": "2020-11-06T00:06:00.000Z"
        }))?;
        assert!(!single.is_clustered());

        let blank = DatabaseMetadata { rac_name: Some(" ".to_string()), ..single.clone() };
        assert!(!blank.is_clustered());

        let rac = DatabaseMetadata { rac_name: Some("jz-rac-1".to_string()), ..single };
        assert!(rac.is_clustered());
        Ok(())
    }
}

// dbclonetool/src/clone/live_mount.rs
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::Result;
use crate::platform::{AsyncJobHandle, BackupPlatform, JobStatus, ResolvedTarget};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const MOUNT_POLL_ATTEMPTS: u32 = 20;
pub const UNMOUNT_POLL_ATTEMPTS: u32 = 12;

/// How waiting on an asynchronous request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Succeeded,
    Failed,
    Canceled,
    /// The attempt budget ran out. The request may still be running remotely.
    Timeout,
}

impl TerminalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalStatus::Succeeded => "SUCCEEDED",
            TerminalStatus::Failed => "FAILED",
            TerminalStatus::Canceled => "CANCELED",
            TerminalStatus::Timeout => "TIMEOUT",
        }
    }
}

/// Requests, waits on and removes live mounts of backup files.
pub struct LiveMountDriver<'a> {
    platform: &'a dyn BackupPlatform,
    poll_interval: Duration,
}

impl<'a> LiveMountDriver<'a> {
    pub fn new(platform: &'a dyn BackupPlatform, poll_interval: Duration) -> Self {
        Self { platform, poll_interval }
    }

    /// Read-only, files-only mount of the backup set as of `time_ms`.
    pub async fn mount(
        &self,
        db_id: &str,
        target: &ResolvedTarget,
        time_ms: i64,
        mount_path: &Path,
    ) -> Result<AsyncJobHandle> {
        let handle = self
            .platform
            .request_live_mount(db_id, target, time_ms, true, mount_path)
            .await?;
        debug!("Backup Live Mount Async Request: {:?}", handle);
        Ok(handle)
    }

    /// Polls at a fixed interval, at most `max_attempts` times.
    pub async fn wait(&self, handle: &AsyncJobHandle, max_attempts: u32) -> Result<TerminalStatus> {
        for attempt in 1..=max_attempts {
            let state = self.platform.poll_job(&handle.id).await?;
            debug!(
                "Async request {} attempt {}/{}: {:?}",
                state.id, attempt, max_attempts, state.status
            );
            if state.status.is_terminal() {
                return Ok(match state.status {
                    JobStatus::Succeeded => TerminalStatus::Succeeded,
                    JobStatus::Failed => {
                        debug!("Async request {} failed: {:?}", state.id, state.error);
                        TerminalStatus::Failed
                    }
                    _ => TerminalStatus::Canceled,
                });
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
        info!(
            "Async request {} did not finish within {} attempts",
            handle.id, max_attempts
        );
        Ok(TerminalStatus::Timeout)
    }

    pub async fn unmount(&self, mount_id: &str) -> Result<AsyncJobHandle> {
        let handle = self.platform.request_unmount(mount_id).await?;
        debug!("Live mount delete Async Request: {:?}", handle);
        Ok(handle)
    }
}

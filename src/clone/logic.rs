// dbclonetool/src/clone/logic.rs
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::bootstrap::bootstrap_instance;
use super::discovery::{self, MountResult};
use super::executor::execute_restore;
use super::live_mount::{
    DEFAULT_POLL_INTERVAL, LiveMountDriver, MOUNT_POLL_ATTEMPTS, TerminalStatus, UNMOUNT_POLL_ATTEMPTS,
};
use super::resolution::{PlatformVersion, ResolvedTime, resolve_target, resolve_time};
use super::script::RestoreScript;
use super::CloneRequest;
use crate::engine::{DatabaseEngine, InstanceContext};
use crate::errors::{CloneError, Result};
use crate::platform::BackupPlatform;

/// Steps of a clone run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneStage {
    ValidateInput,
    ResolveTarget,
    ResolveTime,
    ValidateHome,
    SnapshotDirListing,
    Mount,
    AwaitMount,
    DiscoverNewDir,
    BootstrapInstance,
    BuildScript,
    ExecuteRestore,
    Unmount,
    Done,
}

impl fmt::Display for CloneStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What happened to the live mount after the restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmountOutcome {
    Unmounted,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct CloneOutcome {
    pub new_name: String,
    pub oracle_home: PathBuf,
    pub time: ResolvedTime,
    pub mount: MountResult,
    pub script: String,
    pub unmount: UnmountOutcome,
}

/// Runs the clone workflow against a backup platform and a database engine.
/// No step is retried; only the asynchronous request polls repeat.
pub struct CloneOrchestrator<'a> {
    platform: &'a dyn BackupPlatform,
    engine: &'a dyn DatabaseEngine,
    poll_interval: Duration,
    mount_attempts: u32,
    unmount_attempts: u32,
}

impl<'a> CloneOrchestrator<'a> {
    pub fn new(platform: &'a dyn BackupPlatform, engine: &'a dyn DatabaseEngine) -> Self {
        Self {
            platform,
            engine,
            poll_interval: DEFAULT_POLL_INTERVAL,
            mount_attempts: MOUNT_POLL_ATTEMPTS,
            unmount_attempts: UNMOUNT_POLL_ATTEMPTS,
        }
    }

    #[cfg(test)]
    pub fn with_polling(mut self, interval: Duration, mount_attempts: u32, unmount_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.mount_attempts = mount_attempts;
        self.unmount_attempts = unmount_attempts;
        self
    }

    fn enter(&self, stage: CloneStage) {
        debug!(stage = %stage, "clone stage");
    }

    pub async fn run(&self, request: &CloneRequest) -> Result<CloneOutcome> {
        self.enter(CloneStage::ValidateInput);
        request.validate()?;

        self.enter(CloneStage::ResolveTarget);
        let metadata = self
            .platform
            .database_metadata(&request.source_host, &request.source_db)
            .await?;
        debug!("Source database metadata: {:?}", metadata);
        let version = PlatformVersion::parse(&self.platform.cluster_version().await?)?;
        let target = resolve_target(self.platform, version, &metadata, &request.target_host).await?;

        self.enter(CloneStage::ResolveTime);
        let timezone = self.platform.cluster_timezone().await?;
        let time = resolve_time(
            request.time_restore,
            metadata.latest_recovery_point.as_deref(),
            &timezone,
        )?;

        self.enter(CloneStage::ValidateHome);
        let oracle_home = request
            .oracle_home
            .clone()
            .or_else(|| metadata.oracle_home.as_ref().map(PathBuf::from))
            .ok_or_else(|| {
                CloneError::Resolution(format!(
                    "No ORACLE_HOME was given and none is recorded for {}",
                    request.source_db
                ))
            })?;
        if !oracle_home.is_dir() {
            return Err(CloneError::Resolution(format!(
                "The ORACLE_HOME: {} does not exist on the target host: {}",
                oracle_home.display(),
                request.target_host
            )));
        }

        self.enter(CloneStage::SnapshotDirListing);
        let before = discovery::snapshot(&request.mount_path)?;

        self.enter(CloneStage::Mount);
        let driver = LiveMountDriver::new(self.platform, self.poll_interval);
        warn!(
            "Starting the mount of the requested {} backup pieces on {}.",
            request.source_db, request.target_host
        );
        let handle = driver
            .mount(&metadata.id, &target, time.epoch_ms, &request.mount_path)
            .await?;

        self.enter(CloneStage::AwaitMount);
        let status = driver.wait(&handle, self.mount_attempts).await?;
        info!("Async request completed with status: {}", status.as_str());
        if status != TerminalStatus::Succeeded {
            return Err(CloneError::Mount(format!(
                "Mount of backup files did not complete successfully. Mount ended with status {}",
                status.as_str()
            )));
        }
        warn!("Live mount of the backup files completed.");

        self.enter(CloneStage::DiscoverNewDir);
        let after = discovery::snapshot(&request.mount_path)?;
        let mount = discovery::discover_new_mount(&request.mount_path, &before, &after)?;

        self.enter(CloneStage::BootstrapInstance);
        let ctx = InstanceContext { oracle_home: oracle_home.clone(), sid: request.new_name.clone() };
        bootstrap_instance(self.engine, &ctx, request.policy).await?;

        self.enter(CloneStage::BuildScript);
        let script = RestoreScript::build(request, &mount);

        self.enter(CloneStage::ExecuteRestore);
        warn!(
            "Beginning duplicate of {} to {} on host {}.",
            request.source_db, request.new_name, request.target_host
        );
        execute_restore(self.engine, &ctx, &script).await?;
        warn!("Duplicate of {} database complete.", request.new_name);

        self.enter(CloneStage::Unmount);
        let unmount = self.unmount(&driver, &mount.mount_id).await;

        self.enter(CloneStage::Done);
        warn!("Database clone complete");
        Ok(CloneOutcome {
            new_name: request.new_name.clone(),
            oracle_home,
            time,
            mount,
            script: script.render(),
            unmount,
        })
    }

    /// The clone is complete by now, so nothing here fails the run.
    async fn unmount(&self, driver: &LiveMountDriver<'_>, mount_id: &str) -> UnmountOutcome {
        warn!("Unmounting backups.");
        let status = match driver.unmount(mount_id).await {
            Ok(handle) => driver.wait(&handle, self.unmount_attempts).await,
            Err(e) => Err(e),
        };
        match status {
            Ok(TerminalStatus::Succeeded) => {
                info!("Live mount of backup data files with id: {} has been unmounted.", mount_id);
                warn!("Backups unmounted");
                UnmountOutcome::Unmounted
            }
            Ok(other) => {
                warn!("Unmount of backup files failed with status: {}", other.as_str());
                UnmountOutcome::Failed(other.as_str().to_string())
            }
            Err(e) => {
                warn!("Unmount of backup files failed: {}", e);
                UnmountOutcome::Failed(e.to_string())
            }
        }
    }
}

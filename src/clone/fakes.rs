//! In-memory platform and engine used by the workflow tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{ClonePolicy, CloneRequest, RelocationDirectives};
use crate::engine::{CommandOutput, ConnectionRole, DatabaseEngine, InstanceContext};
use crate::errors::{CloneError, Result};
use crate::platform::{
    AsyncJobHandle, BackupPlatform, DatabaseMetadata, JobState, JobStatus, ResolvedTarget,
};

/// Collects WARN and above emitted on the current thread while installed.
#[derive(Clone, Default)]
pub struct WarningCapture(Arc<Mutex<Vec<u8>>>);

impl WarningCapture {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_target(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn has_warning(&self, message: &str) -> bool {
        self.lines().iter().any(|line| line.contains("WARN") && line.contains(message))
    }
}

impl io::Write for WarningCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub const MOUNT_JOB: &str = "MOUNT_REQ_1";
pub const UNMOUNT_JOB: &str = "UNMOUNT_REQ_1";

pub fn sample_request() -> CloneRequest {
    CloneRequest {
        source_host: "jz-sourcehost-1".to_string(),
        source_db: "ora1db".to_string(),
        target_host: "jz-targethost-1".to_string(),
        new_name: "oracln".to_string(),
        mount_path: PathBuf::from("/u02/oradata/restore"),
        time_restore: None,
        oracle_home: None,
        parallelism: 4,
        relocation: RelocationDirectives::default(),
        policy: ClonePolicy::default(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MountCall {
    pub db_id: String,
    pub target: ResolvedTarget,
    pub time_ms: i64,
    pub files_only: bool,
    pub mount_path: PathBuf,
}

pub struct FakePlatform {
    pub metadata: DatabaseMetadata,
    version: Mutex<String>,
    timezone: String,
    jobs: Mutex<HashMap<String, VecDeque<JobStatus>>>,
    polls: Mutex<HashMap<String, u32>>,
    dirs_created_on_mount: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
    mounts: Mutex<Vec<MountCall>>,
    unmounts: Mutex<Vec<String>>,
    fail_target: AtomicBool,
    fail_unmount_request: AtomicBool,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            metadata: DatabaseMetadata {
                id: "OracleDatabase:::ora1db".to_string(),
                oracle_home: Some("/u01/app/oracle/product/19c/dbhome_1".to_string()),
                latest_recovery_point: Some("2020-11-06T06:06:00.000Z".to_string()),
                rac_name: None,
            },
            version: Mutex::new("5.3.0-p1-1234".to_string()),
            timezone: "America/Chicago".to_string(),
            jobs: Mutex::new(HashMap::new()),
            polls: Mutex::new(HashMap::new()),
            dirs_created_on_mount: Mutex::new(vec!["ORCLN_12345_files".to_string()]),
            calls: Mutex::new(Vec::new()),
            mounts: Mutex::new(Vec::new()),
            unmounts: Mutex::new(Vec::new()),
            fail_target: AtomicBool::new(false),
            fail_unmount_request: AtomicBool::new(false),
        }
    }

    pub fn with_metadata(mut self, metadata: DatabaseMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn set_version(&self, version: &str) {
        *self.version.lock().unwrap() = version.to_string();
    }

    /// Statuses returned by successive polls. The last one repeats.
    pub fn script_job(&self, job_id: &str, statuses: &[JobStatus]) {
        self.jobs
            .lock()
            .unwrap()
            .insert(job_id.to_string(), statuses.iter().cloned().collect());
    }

    pub fn create_on_mount(&self, dirs: &[&str]) {
        *self.dirs_created_on_mount.lock().unwrap() = dirs.iter().map(|d| d.to_string()).collect();
    }

    pub fn fail_target_lookup(&self) {
        self.fail_target.store(true, Ordering::SeqCst);
    }

    pub fn fail_unmount_request(&self) {
        self.fail_unmount_request.store(true, Ordering::SeqCst);
    }

    pub fn poll_count(&self, job_id: &str) -> u32 {
        self.polls.lock().unwrap().get(job_id).copied().unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mounts(&self) -> Vec<MountCall> {
        self.mounts.lock().unwrap().clone()
    }

    pub fn unmounts(&self) -> Vec<String> {
        self.unmounts.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn lookup(&self, kind: &str, hostname: &str) -> Result<ResolvedTarget> {
        self.record(kind);
        if self.fail_target.load(Ordering::SeqCst) {
            return Err(CloneError::Resolution(format!("No mount target found for host {}", hostname)));
        }
        Ok(ResolvedTarget(format!("{}:::{}", kind, hostname)))
    }
}

#[async_trait]
impl BackupPlatform for FakePlatform {
    async fn cluster_version(&self) -> Result<String> {
        self.record("cluster_version");
        Ok(self.version.lock().unwrap().clone())
    }

    async fn cluster_timezone(&self) -> Result<String> {
        self.record("cluster_timezone");
        Ok(self.timezone.clone())
    }

    async fn database_metadata(&self, _host: &str, _db_name: &str) -> Result<DatabaseMetadata> {
        self.record("database_metadata");
        Ok(self.metadata.clone())
    }

    async fn resolve_target(&self, hostname: &str) -> Result<ResolvedTarget> {
        self.lookup("OracleTarget", hostname)
    }

    async fn resolve_host_target(&self, hostname: &str) -> Result<ResolvedTarget> {
        self.lookup("OracleHost", hostname)
    }

    async fn resolve_rac_target(&self, hostname: &str) -> Result<ResolvedTarget> {
        self.lookup("OracleRac", hostname)
    }

    async fn request_live_mount(
        &self,
        db_id: &str,
        target: &ResolvedTarget,
        time_ms: i64,
        files_only: bool,
        mount_path: &Path,
    ) -> Result<AsyncJobHandle> {
        self.record("request_live_mount");
        self.mounts.lock().unwrap().push(MountCall {
            db_id: db_id.to_string(),
            target: target.clone(),
            time_ms,
            files_only,
            mount_path: mount_path.to_path_buf(),
        });
        for dir in self.dirs_created_on_mount.lock().unwrap().iter() {
            fs::create_dir_all(mount_path.join(dir))?;
        }
        Ok(AsyncJobHandle { id: MOUNT_JOB.to_string(), status: JobStatus::Queued })
    }

    async fn poll_job(&self, job_id: &str) -> Result<JobState> {
        *self.polls.lock().unwrap().entry(job_id.to_string()).or_insert(0) += 1;
        let mut jobs = self.jobs.lock().unwrap();
        let status = match jobs.get_mut(job_id) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(JobStatus::Running),
            Some(queue) => queue.front().cloned().unwrap_or(JobStatus::Running),
            None => JobStatus::Succeeded,
        };
        Ok(JobState { id: job_id.to_string(), status, error: None })
    }

    async fn request_unmount(&self, mount_id: &str) -> Result<AsyncJobHandle> {
        self.record("request_unmount");
        self.unmounts.lock().unwrap().push(mount_id.to_string());
        if self.fail_unmount_request.load(Ordering::SeqCst) {
            return Err(CloneError::Mount("unmount request rejected".to_string()));
        }
        Ok(AsyncJobHandle { id: UNMOUNT_JOB.to_string(), status: JobStatus::Queued })
    }
}

pub struct FakeEngine {
    instance_name: String,
    startup_output: Mutex<String>,
    restore_output: Mutex<CommandOutput>,
    shutdown_fails: AtomicBool,
    sysdba: Mutex<Vec<(InstanceContext, String)>>,
    restores: Mutex<Vec<(String, ConnectionRole)>>,
}

impl FakeEngine {
    /// `instance_name` is what `v$instance` reports.
    pub fn new(instance_name: &str) -> Self {
        Self {
            instance_name: instance_name.to_string(),
            startup_output: Mutex::new("ORACLE instance started.\n\nTotal System Global Area 1073741824 bytes".to_string()),
            restore_output: Mutex::new(CommandOutput::ok("Finished Duplicate Db at 06-NOV-20")),
            shutdown_fails: AtomicBool::new(false),
            sysdba: Mutex::new(Vec::new()),
            restores: Mutex::new(Vec::new()),
        }
    }

    pub fn set_startup_output(&self, output: &str) {
        *self.startup_output.lock().unwrap() = output.to_string();
    }

    pub fn set_restore_output(&self, output: CommandOutput) {
        *self.restore_output.lock().unwrap() = output;
    }

    pub fn fail_shutdown(&self) {
        self.shutdown_fails.store(true, Ordering::SeqCst);
    }

    pub fn sysdba_statements(&self) -> Vec<String> {
        self.sysdba.lock().unwrap().iter().map(|(_, sql)| sql.clone()).collect()
    }

    pub fn contexts(&self) -> Vec<InstanceContext> {
        self.sysdba.lock().unwrap().iter().map(|(ctx, _)| ctx.clone()).collect()
    }

    pub fn restore_scripts(&self) -> Vec<(String, ConnectionRole)> {
        self.restores.lock().unwrap().clone()
    }
}

#[async_trait]
impl DatabaseEngine for FakeEngine {
    async fn execute_as_sysdba(&self, ctx: &InstanceContext, sql: &str) -> Result<CommandOutput> {
        self.sysdba.lock().unwrap().push((ctx.clone(), sql.to_string()));
        if sql.starts_with("shutdown") {
            if self.shutdown_fails.load(Ordering::SeqCst) {
                return Err(CloneError::Command("sqlplus exited before shutdown".to_string()));
            }
            return Ok(CommandOutput::ok("ORA-01034: ORACLE not available"));
        }
        if sql.starts_with("startup") {
            return Ok(CommandOutput::ok(self.startup_output.lock().unwrap().clone()));
        }
        if sql.contains("v$instance") {
            return Ok(CommandOutput::ok(format!(
                "\nINSTANCE_NAME\n----------------\n{}\n",
                self.instance_name
            )));
        }
        Ok(CommandOutput::ok(""))
    }

    async fn execute_restore_script(
        &self,
        _ctx: &InstanceContext,
        script: &str,
        role: ConnectionRole,
    ) -> Result<CommandOutput> {
        self.restores.lock().unwrap().push((script.to_string(), role));
        Ok(self.restore_output.lock().unwrap().clone())
    }
}

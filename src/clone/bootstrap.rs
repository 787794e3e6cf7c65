// dbclonetool/src/clone/bootstrap.rs
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::ClonePolicy;
use crate::engine::{DatabaseEngine, InstanceContext};
use crate::errors::{CloneError, Result};

/// Engine error returned when the SID is already in use.
pub const ALREADY_RUNNING_CODE: &str = "ORA-01081";

/// Instance states the bootstrap moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Stopped,
    Starting,
    NomountVerified,
}

/// `<home>/dbs/init<NAME>.ora`, unique per instance name.
pub fn parameter_file_path(oracle_home: &Path, new_name: &str) -> PathBuf {
    oracle_home.join("dbs").join(format!("init{}.ora", new_name))
}

/// Pulls the instance name out of `select instance_name from v$instance;` output.
pub fn reported_instance_name(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.eq_ignore_ascii_case("INSTANCE_NAME"))
        .filter(|line| !line.chars().all(|c| c == '-'))
        .find(|line| !line.contains(' '))
        .map(str::to_string)
}

fn write_minimal_parameter_file(path: &Path, new_name: &str) -> Result<()> {
    debug!("Creating new temporary init file {}", path.display());
    fs::write(path, format!("db_name={}\n", new_name)).map_err(|e| {
        CloneError::Bootstrap(format!(
            "Unable to write the init file {}: {}",
            path.display(),
            e
        ))
    })
}

/// Starts the auxiliary instance in NOMOUNT and checks it is the one asked for.
pub async fn bootstrap_instance(
    engine: &dyn DatabaseEngine,
    ctx: &InstanceContext,
    policy: ClonePolicy,
) -> Result<BootstrapState> {
    let mut state = BootstrapState::Stopped;

    if policy.refresh_existing {
        warn!("Shutting down {} database for refresh", ctx.sid);
        // The instance may not exist yet, so the outcome does not matter.
        match engine.execute_as_sysdba(ctx, "shutdown immediate;").await {
            Ok(output) => info!("{}", output.text()),
            Err(e) => warn!("Shutdown of {} did not complete: {}", ctx.sid, e),
        }
    }

    state = transition(state, BootstrapState::Starting);
    let startup_sql = if policy.skip_parameter_file {
        warn!("Creating minimal init file to start instance");
        let init_file = parameter_file_path(&ctx.oracle_home, &ctx.sid);
        write_minimal_parameter_file(&init_file, &ctx.sid)?;
        format!("startup nomount pfile='{}'", init_file.display())
    } else {
        "startup nomount".to_string()
    };
    warn!("Starting auxiliary instance");
    let startup = engine.execute_as_sysdba(ctx, &startup_sql).await?;
    info!("{}", startup.text());

    if startup.has_error_code(ALREADY_RUNNING_CODE) {
        debug!("There is an instance of {} already running on this host. Aborting clone", ctx.sid);
        return Err(CloneError::Bootstrap(format!(
            "There is an instance of {} already running on this host or refreshed DB did not start cleanly. Aborting clone",
            ctx.sid
        )));
    }

    let identity = engine
        .execute_as_sysdba(ctx, "select instance_name from v$instance;")
        .await?;
    info!("{}", identity.text());
    match reported_instance_name(&identity.stdout) {
        Some(name) if name.eq_ignore_ascii_case(&ctx.sid) => {}
        other => {
            debug!("Instance check returned {:?}", other);
            return Err(CloneError::Bootstrap(format!(
                "DB Instance check failed. Instance name is not {}. Aborting clone",
                ctx.sid
            )));
        }
    }

    state = transition(state, BootstrapState::NomountVerified);
    Ok(state)
}

fn transition(from: BootstrapState, to: BootstrapState) -> BootstrapState {
    debug!("Instance bootstrap {:?} -> {:?}", from, to);
    to
}

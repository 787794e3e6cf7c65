// dbclonetool/src/engine/oracle_cli.rs
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;
use which::which_in;

use super::{CommandOutput, ConnectionRole, DatabaseEngine, InstanceContext};
use crate::errors::{CloneError, Result};

/// Drives `sqlplus` and `rman` from the instance home's `bin` directory.
#[derive(Debug, Default, Clone)]
pub struct OracleCli;

/// Finds an executable in `<oracle_home>/bin`.
fn find_home_executable(oracle_home: &Path, name: &str) -> Result<PathBuf> {
    let bin_dir = oracle_home.join("bin");
    which_in(name, Some(&bin_dir), oracle_home).map_err(|e| {
        CloneError::Command(format!(
            "{} executable not found in {}: {}",
            name,
            bin_dir.display(),
            e
        ))
    })
}

/// Runs `program` with `input` on stdin. ORACLE_HOME and ORACLE_SID are set on
/// the child process only.
async fn run_with_stdin(
    program: &Path,
    args: &[&str],
    ctx: &InstanceContext,
    input: &str,
) -> Result<CommandOutput> {
    debug!(
        "Running {} {:?} with ORACLE_HOME={}, ORACLE_SID={}",
        program.display(),
        args,
        ctx.oracle_home.display(),
        ctx.sid
    );
    let mut child = Command::new(program)
        .args(args)
        .env("ORACLE_HOME", &ctx.oracle_home)
        .env("ORACLE_SID", &ctx.sid)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| CloneError::Command(format!("Failed to start {}: {}", program.display(), e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes()).await?;
        stdin.write_all(b"\nexit;\n").await?;
    }

    let output = child.wait_with_output().await?;
    Ok(CommandOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[async_trait]
impl DatabaseEngine for OracleCli {
    async fn execute_as_sysdba(&self, ctx: &InstanceContext, sql: &str) -> Result<CommandOutput> {
        let sqlplus = find_home_executable(&ctx.oracle_home, "sqlplus")?;
        run_with_stdin(&sqlplus, &["-S", "/", "as", "sysdba"], ctx, sql).await
    }

    async fn execute_restore_script(
        &self,
        ctx: &InstanceContext,
        script: &str,
        role: ConnectionRole,
    ) -> Result<CommandOutput> {
        let rman = find_home_executable(&ctx.oracle_home, "rman")?;
        let role = role.to_string();
        run_with_stdin(&rman, &[role.as_str(), "/"], ctx, script).await
    }
}

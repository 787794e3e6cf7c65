//! Database engine control surface: SQL as SYSDBA and recovery-manager scripts.

pub(crate) mod oracle_cli;

use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::errors::Result;

/// Instance addressing passed to every engine call. Nothing is read from or
/// written to the process-wide environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceContext {
    pub oracle_home: PathBuf,
    pub sid: String,
}

/// Connection the restore script is run under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    Auxiliary,
}

impl fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionRole::Auxiliary => f.write_str("auxiliary"),
        }
    }
}

static ERROR_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:ORA|RMAN)-\d{5}\b").expect("valid error code pattern"));

/// Captured output of one engine command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[cfg(test)]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self { success: true, stdout: stdout.into(), stderr: String::new() }
    }

    /// Engine error codes (`ORA-nnnnn`, `RMAN-nnnnn`) found in either stream, in order.
    pub fn error_codes(&self) -> Vec<String> {
        ERROR_CODE
            .find_iter(&self.stdout)
            .chain(ERROR_CODE.find_iter(&self.stderr))
            .map(|m| m.as_str().to_string())
            .collect()
    }

    pub fn has_error_code(&self, code: &str) -> bool {
        self.error_codes().iter().any(|c| c == code)
    }

    pub fn text(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

#[async_trait]
pub trait DatabaseEngine: Send + Sync {
    async fn execute_as_sysdba(&self, ctx: &InstanceContext, sql: &str) -> Result<CommandOutput>;

    async fn execute_restore_script(
        &self,
        ctx: &InstanceContext,
        script: &str,
        role: ConnectionRole,
    ) -> Result<CommandOutput>;
}

// dbclonetool/src/clone/executor.rs
use tracing::{debug, info, warn};

use super::script::RestoreScript;
use crate::engine::{CommandOutput, ConnectionRole, DatabaseEngine, InstanceContext};
use crate::errors::{CloneError, Result};

/// Submits the duplicate script on the auxiliary connection. A non-zero exit
/// from the recovery manager is a failed restore.
pub async fn execute_restore(
    engine: &dyn DatabaseEngine,
    ctx: &InstanceContext,
    script: &RestoreScript,
) -> Result<CommandOutput> {
    let text = script.render();
    debug!("Duplicate script: {}", text);

    let output = engine
        .execute_restore_script(ctx, &text, ConnectionRole::Auxiliary)
        .await?;
    info!("{}", output.text());

    let codes = output.error_codes();
    if !output.success {
        return Err(CloneError::Restore(format!(
            "Duplicate of {} failed with errors: {}",
            ctx.sid,
            if codes.is_empty() { "no error code reported".to_string() } else { codes.join(", ") }
        )));
    }
    if !codes.is_empty() {
        warn!("Duplicate of {} reported messages: {}", ctx.sid, codes.join(", "));
    }
    Ok(output)
}

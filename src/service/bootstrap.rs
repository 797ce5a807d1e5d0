//! Startup SQL execution.
//!
//! Scripts run as one batch each and are never wrapped in a transaction or
//! retried: a multi-statement script that fails halfway stays partially
//! applied, so scripts should be written to be re-runnable
//! (`CREATE TABLE IF NOT EXISTS`, guarded `ALTER`s and so on).

use crate::db::DatabaseHandle;
use crate::error::ServiceError;
use crate::service::lifecycle::ScriptKind;
use crate::service::options::StartupOptions;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Run the setup script, then the update script. `on_step` is called
/// before each one, whether or not it is configured.
pub async fn bootstrap<H, F>(
    handle: &H,
    options: &StartupOptions,
    mut on_step: F,
) -> Result<(), ServiceError>
where
    H: DatabaseHandle + ?Sized,
    F: FnMut(ScriptKind) + Send,
{
    for kind in [ScriptKind::Setup, ScriptKind::Update] {
        on_step(kind);
        run_script(handle, kind, options.script(kind)).await?;
    }
    Ok(())
}

/// Execute one script. Returns whether anything was executed.
pub async fn run_script<H>(
    handle: &H,
    kind: ScriptKind,
    sql: Option<&str>,
) -> Result<bool, ServiceError>
where
    H: DatabaseHandle + ?Sized,
{
    let Some(sql) = sql.filter(|s| !s.trim().is_empty()) else {
        debug!(script = %kind, "no SQL configured, skipping");
        return Ok(false);
    };

    info!(script = %kind, "executing {kind} SQL");
    handle.execute_batch(sql).await.map_err(|e| {
        error!(script = %kind, error = %e, "error executing {kind} SQL");
        ServiceError::Script {
            script: kind,
            source: Arc::new(e),
        }
    })?;
    Ok(true)
}

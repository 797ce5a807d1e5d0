use crate::config::ScriptsConfig;
use crate::error::ServiceError;
use crate::service::lifecycle::ScriptKind;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// SQL handed to the service at construction. All of it is optional and
/// treated as opaque text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupOptions {
    /// Executed first on every start.
    pub setup_sql: Option<String>,
    /// Executed after the setup script on every start.
    pub update_sql: Option<String>,
    /// Must select exactly one integer column.
    pub revision_sql: Option<String>,
}

impl StartupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_setup_sql(mut self, sql: impl Into<String>) -> Self {
        self.setup_sql = Some(sql.into());
        self
    }

    pub fn with_update_sql(mut self, sql: impl Into<String>) -> Self {
        self.update_sql = Some(sql.into());
        self
    }

    pub fn with_revision_sql(mut self, sql: impl Into<String>) -> Self {
        self.revision_sql = Some(sql.into());
        self
    }

    pub fn script(&self, kind: ScriptKind) -> Option<&str> {
        match kind {
            ScriptKind::Setup => self.setup_sql.as_deref(),
            ScriptKind::Update => self.update_sql.as_deref(),
        }
    }

    /// Read the configured script files.
    pub fn load(scripts: &ScriptsConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            setup_sql: scripts.setup_path.as_deref().map(read_script).transpose()?,
            update_sql: scripts.update_path.as_deref().map(read_script).transpose()?,
            revision_sql: scripts.revision_sql.clone(),
        })
    }
}

fn read_script(path: &Path) -> Result<String, ServiceError> {
    let sql = fs::read_to_string(path).map_err(|e| ServiceError::ScriptFile {
        path: path.to_path_buf(),
        source: Arc::new(e),
    })?;
    info!(path = %path.display(), bytes = sql.len(), "loaded SQL file");
    Ok(sql)
}

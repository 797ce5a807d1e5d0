use crate::service::lifecycle::{Phase, ScriptKind};
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;

/// Errors raised by the postgres lifecycle service.
///
/// Sources are wrapped in `Arc` so a failed start can be reported again on
/// every health call.
#[derive(Debug, Clone, ThisError)]
pub enum ServiceError {
    #[error("can't connect to postgres on {host}:{port} after {attempts} attempts: {source}")]
    Connection {
        host: String,
        port: u16,
        attempts: u32,
        #[source]
        source: Arc<SqlxError>,
    },

    #[error("error executing {script} SQL: {source}")]
    Script {
        script: ScriptKind,
        #[source]
        source: Arc<SqlxError>,
    },

    #[error("retrieving revision from database failed: {source}")]
    Revision {
        #[source]
        source: Arc<SqlxError>,
    },

    #[error("postgres health probe failed: {0}")]
    Probe(#[source] Arc<SqlxError>),

    #[error("postgres service is not connected")]
    NotConnected,

    #[error("startup cancelled while {phase}")]
    Cancelled { phase: Phase },

    #[error("startup did not finish within {0:?}")]
    StartupTimeout(Duration),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration error: {0}")]
    Config(Arc<figment::Error>),

    #[error("can't read SQL file {}: {source}", .path.display())]
    ScriptFile {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
}

/// Coarse classification of [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Open or initial probe failed after all attempts.
    Connection,
    /// Setup or update batch failed. Never retried.
    ScriptExecution,
    /// Revision query failed or returned an unexpected shape.
    RevisionQuery,
    /// Live round-trip check from health failed.
    Probe,
    /// Not connected, cancelled or timed out.
    Lifecycle,
    Configuration,
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Connection { .. } => ErrorKind::Connection,
            ServiceError::Script { .. } => ErrorKind::ScriptExecution,
            ServiceError::Revision { .. } => ErrorKind::RevisionQuery,
            ServiceError::Probe(_) => ErrorKind::Probe,
            ServiceError::NotConnected
            | ServiceError::Cancelled { .. }
            | ServiceError::StartupTimeout(_) => ErrorKind::Lifecycle,
            ServiceError::InvalidConfig(_)
            | ServiceError::Config(_)
            | ServiceError::ScriptFile { .. } => ErrorKind::Configuration,
        }
    }

    /// The underlying database error, if this error came from the client.
    pub fn database_error(&self) -> Option<&SqlxError> {
        match self {
            ServiceError::Connection { source, .. }
            | ServiceError::Script { source, .. }
            | ServiceError::Revision { source }
            | ServiceError::Probe(source) => Some(&**source),
            _ => None,
        }
    }
}

impl From<figment::Error> for ServiceError {
    fn from(e: figment::Error) -> Self {
        ServiceError::Config(Arc::new(e))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let code = match self.kind() {
            ErrorKind::Connection => "CONNECTION_ERROR",
            ErrorKind::ScriptExecution => "SCRIPT_EXECUTION_ERROR",
            ErrorKind::RevisionQuery => "REVISION_QUERY_ERROR",
            ErrorKind::Probe => "PROBE_ERROR",
            ErrorKind::Lifecycle => "NOT_READY",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
        };
        let body = HealthErrorResponse {
            status: "unavailable",
            error: ApiErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

/// Standardized error body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthErrorResponse {
    pub status: &'static str,
    pub error: ApiErrorBody,
}

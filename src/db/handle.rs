use crate::config::PostgresConfig;
use async_trait::async_trait;
use sqlx::Error as SqlxError;

/// Opens connection handles for the lifecycle service.
///
/// A successful `connect` must have completed a round trip with the server,
/// not merely allocated a handle.
#[async_trait]
pub trait Connector: Send + Sync {
    type Handle: DatabaseHandle;

    async fn connect(&self, config: &PostgresConfig) -> Result<Self::Handle, SqlxError>;
}

/// The operations the lifecycle service issues against a live connection.
///
/// Implementations are shared between the start sequence, health probes and
/// application query traffic, so every method takes `&self`.
#[async_trait]
pub trait DatabaseHandle: Send + Sync + 'static {
    /// One round trip to the server.
    async fn ping(&self) -> Result<(), SqlxError>;

    /// Run a script as a single batch. Multi-statement scripts are not
    /// wrapped in a transaction.
    async fn execute_batch(&self, sql: &str) -> Result<(), SqlxError>;

    /// Run a query selecting one integer column and return the first row.
    async fn fetch_revision(&self, sql: &str) -> Result<i64, SqlxError>;

    async fn close(&self);
}

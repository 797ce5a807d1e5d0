//! The postgres lifecycle: connect with retry, run startup SQL, report the
//! schema revision, then answer health probes.

pub mod bootstrap;
pub mod connector;
pub mod lifecycle;
pub mod mock;
pub mod options;
pub mod revision;

use crate::error::ServiceError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use lifecycle::{Phase, PostgresService, ScriptKind};
pub use mock::MockService;
pub use options::StartupOptions;

/// Name the service registers under.
pub const SERVICE_NAME: &str = "postgres";

/// A service with a start/stop lifecycle and a health signal.
#[async_trait]
pub trait LifecycleService: Send + Sync {
    type Handle: Send + Sync;

    fn name(&self) -> &str;

    /// Run the full start sequence. Callers must not overlap `start` and
    /// `stop` on one instance; implementations serialise them anyway.
    async fn start(&self, cancel: CancellationToken) -> Result<(), ServiceError>;

    async fn stop(&self) -> Result<(), ServiceError>;

    /// `Ok` means healthy. Never blocks on a running start.
    async fn health(&self) -> Result<(), ServiceError>;

    fn handle(&self) -> Option<Arc<Self::Handle>>;
}

use crate::config::PostgresConfig;
use crate::db::{Connector, DatabaseHandle, PgConnector, PgHandle};
use crate::error::ServiceError;
use crate::service::bootstrap::bootstrap;
use crate::service::connector::connect;
use crate::service::options::StartupOptions;
use crate::service::revision::report_revision;
use crate::service::{LifecycleService, SERVICE_NAME};
use async_trait::async_trait;
use sqlx::PgPool;
use std::fmt;
use std::io;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Setup,
    Update,
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptKind::Setup => f.write_str("setup"),
            ScriptKind::Update => f.write_str("update"),
        }
    }
}

/// Where a service instance is in its start sequence.
///
/// `Connecting -> Bootstrapping(Setup) -> Bootstrapping(Update) -> Verifying -> Ready`,
/// with `Failed` reachable from every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Connecting,
    Bootstrapping(ScriptKind),
    Verifying,
    Ready,
    Failed,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Uninitialized => f.write_str("uninitialized"),
            Phase::Connecting => f.write_str("connecting"),
            Phase::Bootstrapping(kind) => write!(f, "bootstrapping ({kind})"),
            Phase::Verifying => f.write_str("verifying"),
            Phase::Ready => f.write_str("ready"),
            Phase::Failed => f.write_str("failed"),
            Phase::Stopped => f.write_str("stopped"),
        }
    }
}

struct State<H> {
    phase: Phase,
    last_error: Option<ServiceError>,
    handle: Option<Arc<H>>,
    revision: Option<i64>,
}

/// Postgres connection with a managed start sequence and a health signal.
///
/// `start` and `stop` are serialised per instance. `health` and `handle`
/// only take a short read lock and may be called from any task at any time.
pub struct PostgresService<C: Connector = PgConnector> {
    config: PostgresConfig,
    options: StartupOptions,
    connector: C,
    state: RwLock<State<C::Handle>>,
    lifecycle: Mutex<()>,
}

impl PostgresService<PgConnector> {
    pub fn new(config: PostgresConfig, options: StartupOptions) -> Self {
        Self::with_connector(config, options, PgConnector)
    }

    /// The shared pool, once connected.
    pub fn pool(&self) -> Option<PgPool> {
        self.handle().map(|handle: Arc<PgHandle>| handle.pool().clone())
    }
}

impl<C: Connector> PostgresService<C> {
    pub fn with_connector(config: PostgresConfig, options: StartupOptions, connector: C) -> Self {
        Self {
            config,
            options,
            connector,
            state: RwLock::new(State {
                phase: Phase::Uninitialized,
                last_error: None,
                handle: None,
                revision: None,
            }),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.read_state().phase
    }

    /// Revision reported by the last successful start.
    pub fn revision(&self) -> Option<i64> {
        self.read_state().revision
    }

    pub fn last_error(&self) -> Option<ServiceError> {
        self.read_state().last_error.clone()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, State<C::Handle>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State<C::Handle>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: Phase) {
        debug!(%phase, "postgres service phase change");
        self.write_state().phase = phase;
    }

    /// Clear the previous cycle and hand back its handle for release.
    fn reset(&self) -> Option<Arc<C::Handle>> {
        let mut state = self.write_state();
        state.phase = Phase::Connecting;
        state.last_error = None;
        state.revision = None;
        state.handle.take()
    }

    fn fail(&self, err: ServiceError) {
        let mut state = self.write_state();
        state.phase = Phase::Failed;
        state.last_error = Some(err);
    }

    async fn run_startup(&self, cancel: &CancellationToken) -> Result<(), ServiceError> {
        self.config.validate()?;

        let handle = Arc::new(connect(&self.connector, &self.config, cancel).await?);
        self.write_state().handle = Some(handle.clone());

        bootstrap(handle.as_ref(), &self.options, |kind| {
            self.set_phase(Phase::Bootstrapping(kind));
        })
        .await?;

        self.set_phase(Phase::Verifying);
        let revision =
            report_revision(handle.as_ref(), self.options.revision_sql.as_deref()).await?;
        self.write_state().revision = revision;
        Ok(())
    }
}

#[async_trait]
impl<C: Connector> LifecycleService for PostgresService<C> {
    type Handle = C::Handle;

    fn name(&self) -> &str {
        SERVICE_NAME
    }

    async fn start(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let _guard = self.lifecycle.lock().await;

        if let Some(previous) = self.reset() {
            debug!("releasing handle from previous start");
            previous.close().await;
        }

        let result = match self.config.startup_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.run_startup(&cancel))
                .await
                .unwrap_or_else(|_| Err(ServiceError::StartupTimeout(limit))),
            None => self.run_startup(&cancel).await,
        };

        match result {
            Ok(()) => {
                self.set_phase(Phase::Ready);
                info!(host = %self.config.host, port = self.config.port, "postgres service ready");
                Ok(())
            }
            Err(e) => {
                error!(
                    host = %self.config.host,
                    port = self.config.port,
                    phase = %self.phase(),
                    error = %e,
                    "postgres service failed to start"
                );
                self.fail(e.clone());
                Err(e)
            }
        }
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        let _guard = self.lifecycle.lock().await;

        let handle = {
            let mut state = self.write_state();
            if state.phase == Phase::Uninitialized {
                return Ok(());
            }
            state.phase = Phase::Stopped;
            state.revision = None;
            state.handle.take()
        };

        if let Some(handle) = handle {
            handle.close().await;
        }
        info!(host = %self.config.host, port = self.config.port, "postgres service stopped");
        Ok(())
    }

    async fn health(&self) -> Result<(), ServiceError> {
        let handle = {
            let state = self.read_state();
            if let Some(err) = &state.last_error {
                return Err(err.clone());
            }
            state.handle.clone()
        };
        let handle = handle.ok_or(ServiceError::NotConnected)?;

        let limit = self.config.connect_timeout();
        match tokio::time::timeout(limit, handle.ping()).await {
            Ok(result) => result.map_err(|e| ServiceError::Probe(Arc::new(e))),
            Err(_) => Err(ServiceError::Probe(Arc::new(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("ping did not answer within {limit:?}"),
            ))))),
        }
    }

    fn handle(&self) -> Option<Arc<C::Handle>> {
        self.read_state().handle.clone()
    }
}

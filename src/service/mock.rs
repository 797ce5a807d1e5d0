use crate::db::PgHandle;
use crate::error::ServiceError;
use crate::service::{LifecycleService, SERVICE_NAME};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Stand-in for [`PostgresService`](crate::service::PostgresService) in
/// tests of code that depends on a [`LifecycleService`].
///
/// Every call is counted; results are configurable and can be changed while
/// the mock is shared.
pub struct MockService<H = PgHandle> {
    name: String,
    start_result: Mutex<Result<(), ServiceError>>,
    stop_result: Mutex<Result<(), ServiceError>>,
    health_result: Mutex<Result<(), ServiceError>>,
    handle: Option<Arc<H>>,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    health_calls: AtomicUsize,
    handle_calls: AtomicUsize,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H> Default for MockService<H> {
    fn default() -> Self {
        Self {
            name: SERVICE_NAME.to_string(),
            start_result: Mutex::new(Ok(())),
            stop_result: Mutex::new(Ok(())),
            health_result: Mutex::new(Ok(())),
            handle: None,
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
            handle_calls: AtomicUsize::new(0),
        }
    }
}

impl<H> MockService<H> {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_handle(mut self, handle: H) -> Self {
        self.handle = Some(Arc::new(handle));
        self
    }

    pub fn with_start_result(self, result: Result<(), ServiceError>) -> Self {
        self.set_start_result(result);
        self
    }

    pub fn with_health_result(self, result: Result<(), ServiceError>) -> Self {
        self.set_health_result(result);
        self
    }

    pub fn set_start_result(&self, result: Result<(), ServiceError>) {
        *self.start_result.lock().unwrap_or_else(PoisonError::into_inner) = result;
    }

    pub fn set_stop_result(&self, result: Result<(), ServiceError>) {
        *self.stop_result.lock().unwrap_or_else(PoisonError::into_inner) = result;
    }

    pub fn set_health_result(&self, result: Result<(), ServiceError>) {
        *self.health_result.lock().unwrap_or_else(PoisonError::into_inner) = result;
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn handle_calls(&self) -> usize {
        self.handle_calls.load(Ordering::SeqCst)
    }

    fn current(slot: &Mutex<Result<(), ServiceError>>) -> Result<(), ServiceError> {
        slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl<H: Send + Sync> LifecycleService for MockService<H> {
    type Handle = H;

    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, _cancel: CancellationToken) -> Result<(), ServiceError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Self::current(&self.start_result)
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Self::current(&self.stop_result)
    }

    async fn health(&self) -> Result<(), ServiceError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        Self::current(&self.health_result)
    }

    fn handle(&self) -> Option<Arc<H>> {
        self.handle_calls.fetch_add(1, Ordering::SeqCst);
        self.handle.clone()
    }
}

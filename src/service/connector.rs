use crate::config::PostgresConfig;
use crate::db::Connector;
use crate::error::ServiceError;
use crate::service::lifecycle::Phase;
use backon::{ConstantBuilder, Retryable};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Fixed-interval policy; the first attempt is not a retry.
fn retry_policy(config: &PostgresConfig) -> ConstantBuilder {
    ConstantBuilder::default()
        .with_delay(config.retry_interval())
        .with_max_times((config.max_attempts() - 1) as usize)
}

/// Open a live handle, retrying every `retry_interval` until
/// `max_attempts` is used up or `cancel` fires.
pub async fn connect<C: Connector>(
    connector: &C,
    config: &PostgresConfig,
    cancel: &CancellationToken,
) -> Result<C::Handle, ServiceError> {
    let host = config.host.as_str();
    let port = config.port;
    let attempts = AtomicU32::new(0);
    let counter = &attempts;

    debug!(
        host,
        port,
        max_attempts = config.max_attempts(),
        retry_budget = ?config.retry_budget(),
        "starting postgres connect loop"
    );

    let attempt = move || async move {
        let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
        info!(host, port, attempt = n, "connecting to postgres database");
        connector.connect(config).await.inspect_err(|e| {
            error!(host, port, attempt = n, error = %e, "can't connect to postgres");
        })
    };

    let retry = attempt
        .retry(retry_policy(config))
        .notify(|_, delay| debug!(host, port, retry_in = ?delay, "retrying postgres connection"));

    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            info!(host, port, "postgres connect cancelled");
            return Err(ServiceError::Cancelled { phase: Phase::Connecting });
        }
        result = retry => result,
    };

    let attempts = attempts.load(Ordering::Relaxed);
    match result {
        Ok(handle) => {
            info!(host, port, attempts, "connected to postgres database");
            Ok(handle)
        }
        Err(e) => {
            error!(
                host,
                port,
                attempts,
                error = %e,
                "can't connect to postgres after all attempts"
            );
            Err(ServiceError::Connection {
                host: host.to_string(),
                port,
                attempts,
                source: Arc::new(e),
            })
        }
    }
}

use mimalloc::MiMalloc;
use pg_lifecycle::{Config, LifecycleService, PostgresService, ServiceError, StartupOptions};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        host = %cfg.postgres.host,
        port = cfg.postgres.port,
        database = %cfg.postgres.database,
        max_retries = cfg.postgres.max_retries,
        retry_interval = cfg.postgres.retry_interval,
        loglevel = %cfg.basic.loglevel
    );

    let options = StartupOptions::load(&cfg.scripts)?;
    let service = Arc::new(PostgresService::new(cfg.postgres.clone(), options));

    // Ctrl-C aborts a hanging start and later shuts the health endpoint down.
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                shutdown.cancel();
            }
        });
    }

    match service.start(shutdown.clone()).await {
        Ok(()) => {
            if let Some(revision) = service.revision() {
                info!(revision, "postgres started");
            }
        }
        Err(ServiceError::Cancelled { phase }) => {
            info!(%phase, "startup cancelled, exiting");
            return Ok(());
        }
        // Keep serving so the supervisor sees the failure through /health.
        Err(e) => error!(error = %e, "postgres startup failed"),
    }

    let app = pg_lifecycle::server::health_router(service.clone());
    let listener = TcpListener::bind(cfg.basic.listen_addr.as_str()).await?;
    info!("health endpoint listening on {}", cfg.basic.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    if let Err(e) = service.stop().await {
        error!(error = %e, "error stopping postgres service");
    }
    Ok(())
}

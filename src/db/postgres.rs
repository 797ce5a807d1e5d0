use crate::config::PostgresConfig;
use crate::db::handle::{Connector, DatabaseHandle};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPoolOptions, PgRow};
use sqlx::{Column, Connection, Error as SqlxError, PgPool, Row, TypeInfo};
use std::io;

/// Builds the connect target field by field; the password never ends up in a
/// formatted URL.
///
/// `~/.pgpass` is not consulted. Fields left empty in the config (user,
/// password, database) fall back to `PGUSER` / `PGPASSWORD` / `PGDATABASE`,
/// as libpq does; host and port always come from the config.
pub fn connect_options(config: &PostgresConfig) -> Result<PgConnectOptions, SqlxError> {
    let ssl_mode = config
        .ssl_mode()
        .map_err(|e| SqlxError::Configuration(e.to_string().into()))?;
    let mut options = PgConnectOptions::new_without_pgpass()
        .host(&config.host)
        .port(config.port)
        .ssl_mode(ssl_mode)
        .application_name("pg-lifecycle");
    if !config.user.is_empty() {
        options = options.username(&config.user);
    }
    if !config.password.is_empty() {
        options = options.password(&config.password);
    }
    if !config.database.is_empty() {
        options = options.database(&config.database);
    }
    Ok(options)
}

/// Proves the server reachable with one direct connection and ping, then
/// hands out a lazily filled `PgPool`.
///
/// One `connect` call is exactly one attempt: the pool's own acquire retries
/// never run here, so the caller sees the real failure (refused, DNS, auth).
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    type Handle = PgHandle;

    async fn connect(&self, config: &PostgresConfig) -> Result<PgHandle, SqlxError> {
        let options = connect_options(config)?;
        let limit = config.connect_timeout();

        let mut conn = tokio::time::timeout(limit, PgConnection::connect_with(&options))
            .await
            .map_err(|_| timed_out(format!("no answer from server within {limit:?}")))??;
        let pinged = conn.ping().await;
        let _ = conn.close().await;
        pinged?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(limit)
            .connect_lazy_with(options);
        Ok(PgHandle::new(pool))
    }
}

fn timed_out(message: String) -> SqlxError {
    SqlxError::Io(io::Error::new(io::ErrorKind::TimedOut, message))
}

#[derive(Debug, Clone)]
pub struct PgHandle {
    pool: PgPool,
}

impl PgHandle {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DatabaseHandle for PgHandle {
    async fn ping(&self) -> Result<(), SqlxError> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await
    }

    async fn execute_batch(&self, sql: &str) -> Result<(), SqlxError> {
        // simple-query protocol, so scripts may hold several statements
        sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_revision(&self, sql: &str) -> Result<i64, SqlxError> {
        let row = sqlx::query(sql).fetch_one(&self.pool).await?;
        revision_from_row(&row)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn revision_from_row(row: &PgRow) -> Result<i64, SqlxError> {
    if row.len() != 1 {
        return Err(SqlxError::Decode(
            format!("revision query must select one column, got {}", row.len()).into(),
        ));
    }
    match row.column(0).type_info().name() {
        "INT2" => row.try_get::<i16, _>(0).map(i64::from),
        "INT4" => row.try_get::<i32, _>(0).map(i64::from),
        _ => row.try_get::<i64, _>(0),
    }
}

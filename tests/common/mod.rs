#![allow(dead_code)]

use async_trait::async_trait;
use pg_lifecycle::PostgresConfig;
use pg_lifecycle::db::{Connector, DatabaseHandle};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// What the fake answers to the revision query.
#[derive(Debug, Clone, Copy)]
pub enum RevisionAnswer {
    Value(i64),
    NoRows,
    NotInteger,
}

/// Shared, scriptable server state behind [`FakeConnector`].
pub struct FakeDb {
    fail_first: AtomicU32,
    connect_calls: AtomicU32,
    reachable: AtomicBool,
    failing_sql: Mutex<Option<String>>,
    executed: Mutex<Vec<String>>,
    revision: Mutex<RevisionAnswer>,
    revision_queries: AtomicU32,
    closed: AtomicU32,
}

impl FakeDb {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_first: AtomicU32::new(0),
            connect_calls: AtomicU32::new(0),
            reachable: AtomicBool::new(true),
            failing_sql: Mutex::new(None),
            executed: Mutex::new(Vec::new()),
            revision: Mutex::new(RevisionAnswer::Value(1)),
            revision_queries: AtomicU32::new(0),
            closed: AtomicU32::new(0),
        })
    }

    /// Refuse the first `n` connection attempts.
    pub fn fail_first(&self, n: u32) {
        self.fail_first.store(n, Ordering::SeqCst);
    }

    pub fn always_fail(&self) {
        self.fail_first(u32::MAX);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make executing exactly `sql` fail with a syntax error.
    pub fn fail_on(&self, sql: &str) {
        *self.failing_sql.lock().unwrap() = Some(sql.to_string());
    }

    pub fn answer_revision(&self, answer: RevisionAnswer) {
        *self.revision.lock().unwrap() = answer;
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn revision_queries(&self) -> u32 {
        self.revision_queries.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u32 {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct FakeConnector {
    pub db: Arc<FakeDb>,
}

impl FakeConnector {
    pub fn new(db: &Arc<FakeDb>) -> Self {
        Self { db: db.clone() }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Handle = FakeHandle;

    async fn connect(&self, _config: &PostgresConfig) -> Result<FakeHandle, sqlx::Error> {
        let attempt = self.db.connect_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.db.fail_first.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(FakeHandle {
            db: self.db.clone(),
        })
    }
}

pub struct FakeHandle {
    db: Arc<FakeDb>,
}

#[async_trait]
impl DatabaseHandle for FakeHandle {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        if self.db.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )))
        }
    }

    async fn execute_batch(&self, sql: &str) -> Result<(), sqlx::Error> {
        self.db.executed.lock().unwrap().push(sql.to_string());
        if self.db.failing_sql.lock().unwrap().as_deref() == Some(sql) {
            return Err(sqlx::Error::Protocol(format!(
                "syntax error at or near \"{sql}\""
            )));
        }
        Ok(())
    }

    async fn fetch_revision(&self, _sql: &str) -> Result<i64, sqlx::Error> {
        self.db.revision_queries.fetch_add(1, Ordering::SeqCst);
        let answer = *self.db.revision.lock().unwrap();
        match answer {
            RevisionAnswer::Value(v) => Ok(v),
            RevisionAnswer::NoRows => Err(sqlx::Error::RowNotFound),
            RevisionAnswer::NotInteger => Err(sqlx::Error::ColumnDecode {
                index: "0".to_string(),
                source: "mismatched types; expected INT8, found TEXT".into(),
            }),
        }
    }

    async fn close(&self) {
        self.db.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn config(max_retries: u32, retry_interval: u64) -> PostgresConfig {
    PostgresConfig {
        host: "db1".to_string(),
        port: 5432,
        user: "app".to_string(),
        password: "secret".to_string(),
        database: "app".to_string(),
        max_retries,
        retry_interval,
        ..PostgresConfig::default()
    }
}

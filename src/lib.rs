pub mod config;
pub mod db;
pub mod error;
pub mod server;
pub mod service;

pub use config::{Config, PostgresConfig};
pub use error::{ErrorKind, ServiceError};
pub use service::{LifecycleService, Phase, PostgresService, SERVICE_NAME, StartupOptions};

//! Database seam for the lifecycle service.
//!
//! Layout:
//! - `handle.rs`: the `Connector` / `DatabaseHandle` traits the state machine drives
//! - `postgres.rs`: sqlx-backed implementations on top of `PgPool`

pub mod handle;
pub mod postgres;

pub use handle::{Connector, DatabaseHandle};
pub use postgres::{PgConnector, PgHandle};

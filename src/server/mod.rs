pub mod router;

pub use router::health_router;

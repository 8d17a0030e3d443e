// pagegen-pool - in-memory pool and pre-generation subsystem for the
// SEO page-rendering backend.
//
// This crate owns the hot path: generated-string pools, FIFO consumable
// pools backed by a relational store, reusable collection pools, number
// ranges, composite generators, a template analyzer, a fast compiled-template
// renderer, and the hot-reload/coordination glue that ties them together.
// The HTTP front end, auth, the relational store itself, and alerting are
// collaborators reached only through the trait boundaries in `datasource`.

pub mod alert;
pub mod analyzer;
pub mod config;
pub mod coordinator;
pub mod datasource;
pub mod error;
pub mod memory;
pub mod pool;
pub mod reload;
pub mod render;
pub mod stats;

pub use config::PoolSystemConfig;
pub use coordinator::PoolCoordinator;
pub use error::{PoolError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Configuration loading and models.
//!
//! Configuration is assembled from built-in defaults, an optional TOML file and
//! `ROOMSYNC_`-prefixed environment variables, then validated section by
//! section. The deployment [`Environment`] is resolved separately from
//! `APP_ENV` because it gates behavior (inline-execution fallback) rather than
//! describing a backend.

pub mod environment;
pub mod models;

pub use environment::Environment;
pub use models::{
    AppConfig, AutoSyncConfig, DatabaseConfig, LockConfig, PlatformConfig, QueueBackend,
    QueueConfig, SummaryConfig, WorkerConfig,
};

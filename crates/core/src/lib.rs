pub mod config;
pub mod errors;
pub mod logging;

pub use config::{
    AppConfig, AutoSyncConfig, DatabaseConfig, Environment, LockConfig, PlatformConfig,
    QueueBackend, QueueConfig, SummaryConfig, WorkerConfig,
};
pub use errors::{SyncError, SyncResult};
pub use logging::init_logging;

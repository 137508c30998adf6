pub mod app_config;
pub mod database;
pub mod platform;
pub mod queue;
pub mod sync;

pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use platform::{PlatformConfig, SummaryConfig};
pub use queue::{LockConfig, QueueBackend, QueueConfig};
pub use sync::{AutoSyncConfig, WorkerConfig};

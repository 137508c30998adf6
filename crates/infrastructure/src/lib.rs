pub mod database;
pub mod lock;
pub mod memory;
pub mod platform;
pub mod queue;
pub mod summary;

pub use database::{create_pool, run_migrations};
pub use database::postgres::{
    PostgresJobRepository, PostgresMessageRepository, PostgresRoomRepository,
};
pub use lock::{InMemoryLockStore, RedisLockStore};
pub use memory::{InMemoryJobRepository, InMemoryMessageRepository, InMemoryRoomRepository};
pub use platform::HttpPlatformClient;
pub use queue::{InMemoryJobQueue, RabbitJobQueue};
pub use summary::OpenAiSummaryModel;

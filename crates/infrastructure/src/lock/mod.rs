pub mod memory;
pub mod redis;

pub use self::redis::RedisLockStore;
pub use memory::InMemoryLockStore;

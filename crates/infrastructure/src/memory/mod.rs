pub mod repositories;

pub use repositories::{InMemoryJobRepository, InMemoryMessageRepository, InMemoryRoomRepository};

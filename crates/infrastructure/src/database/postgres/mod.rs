pub mod job_repository;
pub mod message_repository;
pub mod room_repository;

pub use job_repository::PostgresJobRepository;
pub use message_repository::PostgresMessageRepository;
pub use room_repository::PostgresRoomRepository;

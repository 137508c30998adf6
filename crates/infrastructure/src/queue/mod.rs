pub mod memory;
pub mod rabbitmq;

pub use memory::InMemoryJobQueue;
pub use rabbitmq::RabbitJobQueue;

pub mod entities;
pub mod ports;
pub mod repositories;
pub mod value_objects;

pub use entities::*;
pub use ports::*;
pub use repositories::*;
pub use roomsync_core::{SyncError, SyncResult};
pub use value_objects::*;

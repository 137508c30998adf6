pub mod digest;
pub mod executor;
pub mod job_service;
pub mod messages_sync;
pub mod rooms_sync;
pub mod trigger;

#[cfg(test)]
pub mod test_utils;

pub use digest::{DigestPipeline, RuleBasedSummarizer};
pub use executor::{JobCancelProbe, JobExecutor};
pub use job_service::{JobService, SyncOptions};
pub use messages_sync::MessagesSync;
pub use rooms_sync::RoomsSync;
pub use trigger::{eligible_rooms, OnDemandTrigger};

//! Distributed auto-sync scheduling.
//!
//! Every deployed instance may run an [`AutoSyncScheduler`]; a shared lock
//! store elects one winner per tick so the fleet behaves like a single
//! scheduler.

pub mod auto_sync;

pub use auto_sync::{AutoSyncScheduler, TickJobs};

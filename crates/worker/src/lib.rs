//! Queue-draining worker pool.
//!
//! A [`WorkerService`] polls the job queue and runs each envelope through
//! the executor on a bounded slot pool. Deployments scale by running more
//! worker processes; job-state guards keep redeliveries harmless.

pub mod service;

pub use service::{WorkerService, WorkerServiceBuilder};

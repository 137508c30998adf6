use async_trait::async_trait;

use roomsync_core::SyncResult;

/// Cooperative cancellation checkpoint.
///
/// Sync algorithms call [`checkpoint`](CancelProbe::checkpoint) between
/// discrete units of work (per room). An `Err(SyncError::Canceled)` aborts
/// the run; cancellation is poll-based, never preemptive.
#[async_trait]
pub trait CancelProbe: Send + Sync {
    async fn checkpoint(&self) -> SyncResult<()>;
}

/// Probe for contexts with nothing to cancel (inline runs, tests)
pub struct NeverCanceled;

#[async_trait]
impl CancelProbe for NeverCanceled {
    async fn checkpoint(&self) -> SyncResult<()> {
        Ok(())
    }
}

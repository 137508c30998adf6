use std::time::Duration;

use async_trait::async_trait;

use roomsync_core::SyncResult;

/// TTL-bound mutual exclusion in a shared store.
///
/// `acquire` is an atomic set-if-absent; `release` deletes the key only
/// while it still holds this owner's token, so a lock that expired and was
/// re-acquired elsewhere is never released by the old owner.
#[async_trait]
pub trait LockStore: Send + Sync {
    async fn acquire(&self, key: &str, token: &str, ttl: Duration) -> SyncResult<bool>;

    async fn release(&self, key: &str, token: &str) -> SyncResult<bool>;

    /// Reachability probe, used by scheduler preconditions
    async fn ping(&self) -> SyncResult<()>;
}

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use roomsync_core::SyncResult;
use roomsync_domain::ports::LockStore;

/// Process-local lock store for embedded mode and tests. Semantics match
/// the Redis store: set-if-absent with TTL, token-checked release.
#[derive(Default)]
pub struct InMemoryLockStore {
    locks: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn acquire(&self, key: &str, token: &str, ttl: Duration) -> SyncResult<bool> {
        let mut locks = self.locks.lock().await;
        let now = Instant::now();

        if let Some((_, expires_at)) = locks.get(key) {
            if *expires_at > now {
                return Ok(false);
            }
        }

        locks.insert(key.to_string(), (token.to_string(), now + ttl));
        Ok(true)
    }

    async fn release(&self, key: &str, token: &str) -> SyncResult<bool> {
        let mut locks = self.locks.lock().await;
        let now = Instant::now();

        match locks.get(key) {
            Some((held, expires_at)) if held == token && *expires_at > now => {
                locks.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> SyncResult<()> {
        Ok(())
    }
}

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use roomsync_core::{LockConfig, SyncError, SyncResult};
use roomsync_domain::ports::LockStore;

/// Delete the key only while it still holds the caller's token
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis-backed lock store using SET NX EX plus a compare-and-delete script
pub struct RedisLockStore {
    manager: ConnectionManager,
}

impl RedisLockStore {
    pub async fn connect(config: &LockConfig) -> SyncResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| SyncError::Lock(format!("invalid redis url: {e}")))?;

        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| SyncError::Lock(format!("failed to connect to redis: {e}")))?;

        info!("lock store connected");

        let store = Self { manager };
        store.ping().await?;

        Ok(store)
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn acquire(&self, key: &str, token: &str, ttl: Duration) -> SyncResult<bool> {
        let mut conn = self.manager.clone();
        let ttl_seconds = ttl.as_secs().max(1);

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| SyncError::Lock(format!("acquire failed: {e}")))?;

        let acquired = reply.is_some();
        debug!(key, acquired, ttl_seconds, "lock acquire attempted");
        Ok(acquired)
    }

    async fn release(&self, key: &str, token: &str) -> SyncResult<bool> {
        let mut conn = self.manager.clone();

        let deleted: i64 = redis::cmd("EVAL")
            .arg(RELEASE_SCRIPT)
            .arg(1)
            .arg(key)
            .arg(token)
            .query_async(&mut conn)
            .await
            .map_err(|e| SyncError::Lock(format!("release failed: {e}")))?;

        Ok(deleted == 1)
    }

    async fn ping(&self) -> SyncResult<()> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| SyncError::Lock(format!("ping failed: {e}")))?;
        Ok(())
    }
}

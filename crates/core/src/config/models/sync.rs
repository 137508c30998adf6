use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Minimum lock TTL and refresh spacing, seconds
const FLOOR_SECONDS: u64 = 60;

/// Auto-sync scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoSyncConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    /// Cap on rooms per scheduled messages-sync run; None syncs all active rooms
    pub room_limit: Option<usize>,
    /// Cap on rooms enqueued by one on-demand trigger
    pub trigger_room_cap: usize,
}

impl Default for AutoSyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: 300,
            room_limit: None,
            trigger_room_cap: 10,
        }
    }
}

impl AutoSyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Scheduler lock TTL: at least twice the interval, never below one minute,
    /// so an expired holder cannot overlap a live one.
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs((self.interval_seconds * 2).max(FLOOR_SECONDS))
    }

    /// Minimum spacing between refreshes of the same room, shared by the
    /// on-demand trigger eligibility check and its rate-limit cooldown.
    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(FLOOR_SECONDS))
    }

    /// Validate auto-sync configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interval_seconds == 0 {
            return Err(anyhow::anyhow!("interval_seconds must be greater than 0"));
        }

        if self.trigger_room_cap == 0 {
            return Err(anyhow::anyhow!("trigger_room_cap must be greater than 0"));
        }

        if let Some(limit) = self.room_limit {
            if limit == 0 {
                return Err(anyhow::anyhow!("room_limit must be greater than 0"));
            }
        }

        Ok(())
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub enabled: bool,
    pub max_concurrent_jobs: usize,
    pub poll_interval_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent_jobs: 4,
            poll_interval_seconds: 1,
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Validate worker configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(anyhow::anyhow!(
                "max_concurrent_jobs must be greater than 0"
            ));
        }

        if self.poll_interval_seconds == 0 {
            return Err(anyhow::anyhow!(
                "poll_interval_seconds must be greater than 0"
            ));
        }

        Ok(())
    }
}

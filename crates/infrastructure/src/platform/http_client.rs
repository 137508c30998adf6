use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use roomsync_core::{PlatformConfig, SyncError, SyncResult};
use roomsync_domain::ports::{PlatformClient, PlatformMessage, PlatformRoom};

/// Fixed delay between transport / 5xx retries
const RETRY_DELAY: Duration = Duration::from_secs(1);
/// Bounds applied to the platform's rate-limit reset hint
const MIN_RATE_LIMIT_WAIT: u64 = 1;
const MAX_RATE_LIMIT_WAIT: u64 = 60;

const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// HTTP client for the external messaging platform.
///
/// Every request carries a deadline. Transport failures and 5xx responses
/// retry on a shared budget of `max_retries`; a 429 waits out the server's
/// reset hint (clamped to [1s, 60s]) before its retry. Once the budget is
/// spent the error propagates unchanged.
pub struct HttpPlatformClient {
    client: reqwest::Client,
    api_token: String,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
}

impl HttpPlatformClient {
    /// Fails fast when no API token is configured
    pub fn new(config: &PlatformConfig) -> SyncResult<Self> {
        let api_token = config
            .api_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                SyncError::Configuration("platform api token is required".to_string())
            })?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_token,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_seconds),
            max_retries: config.max_retries,
        })
    }

    /// Wait derived from the reset timestamp header, clamped to [1s, 60s].
    /// A missing or malformed header falls back to the fixed retry delay.
    fn rate_limit_wait(headers: &HeaderMap) -> Duration {
        let reset_epoch = headers
            .get(RATE_LIMIT_RESET_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<i64>().ok());

        match reset_epoch {
            Some(reset) => {
                let wait = reset - Utc::now().timestamp();
                let wait = wait.clamp(MIN_RATE_LIMIT_WAIT as i64, MAX_RATE_LIMIT_WAIT as i64);
                Duration::from_secs(wait as u64)
            }
            None => RETRY_DELAY,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> SyncResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;

        loop {
            let result = self
                .client
                .get(&url)
                .bearer_auth(&self.api_token)
                .timeout(self.timeout)
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    if attempt < self.max_retries {
                        attempt += 1;
                        debug!(%url, attempt, "transport error, retrying: {e}");
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                    return Err(SyncError::Transport(e.to_string()));
                }
            };

            let status = response.status();

            if status.as_u16() == 429 && attempt < self.max_retries {
                let wait = Self::rate_limit_wait(response.headers());
                warn!(
                    %url,
                    wait_seconds = wait.as_secs(),
                    "platform rate limited, backing off"
                );
                attempt += 1;
                tokio::time::sleep(wait).await;
                continue;
            }

            if status.is_server_error() && attempt < self.max_retries {
                attempt += 1;
                debug!(%url, status = status.as_u16(), attempt, "server error, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }

            if !status.is_success() {
                // body kept verbatim; truncation is the persisting caller's job
                let body = response.text().await.unwrap_or_default();
                return Err(SyncError::PlatformApi {
                    status: status.as_u16(),
                    body,
                });
            }

            return response
                .json::<T>()
                .await
                .map_err(|e| SyncError::Serialization(format!("bad platform response: {e}")));
        }
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn list_rooms(&self) -> SyncResult<Vec<PlatformRoom>> {
        self.get_json("/rooms").await
    }

    async fn list_messages(
        &self,
        room_external_id: &str,
        force: bool,
    ) -> SyncResult<Vec<PlatformMessage>> {
        self.get_json(&format!("/rooms/{room_external_id}/messages?force={force}"))
            .await
    }
}

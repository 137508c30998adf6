use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use roomsync_core::{SummaryConfig, SyncError, SyncResult};
use roomsync_domain::ports::{SummaryModel, SummaryOutput, SummaryRequest};
use roomsync_domain::value_objects::TokenUsage;

/// Chat-completions client for any OpenAI-compatible endpoint
pub struct OpenAiSummaryModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OpenAiSummaryModel {
    pub fn new(config: &SummaryConfig) -> SyncResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| SyncError::Configuration("summary api key is required".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }
}

#[async_trait]
impl SummaryModel for OpenAiSummaryModel {
    async fn summarize(&self, request: &SummaryRequest) -> SyncResult<SummaryOutput> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.instruction },
                { "role": "user", "content": request.content },
            ],
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::Summary(format!("model request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::Summary(format!("model API error {status}: {text}")));
        }

        let reply: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SyncError::Summary(format!("bad model response: {e}")))?;

        let text = reply["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| SyncError::Summary("no content in model response".to_string()))?
            .trim()
            .to_string();

        // a call without usage data still counts as one request
        let usage = reply["usage"]
            .as_object()
            .map(|u| TokenUsage {
                prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
                completion_tokens: u
                    .get("completion_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0),
                total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
                requests: 1,
            })
            .unwrap_or(TokenUsage {
                requests: 1,
                ..Default::default()
            });

        debug!(model = %self.model, tokens = usage.total_tokens, "summary generated");

        Ok(SummaryOutput { text, usage })
    }
}

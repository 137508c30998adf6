use serde::{Deserialize, Serialize};

/// External messaging platform API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub api_token: Option<String>,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: "https://api.chatplatform.example.com/v1".to_string(),
            timeout_seconds: 10,
            max_retries: 1,
        }
    }
}

impl PlatformConfig {
    /// True when an API token is present and non-empty
    pub fn credentials_configured(&self) -> bool {
        self.api_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Validate platform configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(anyhow::anyhow!("platform base_url must be an HTTP url"));
        }

        if self.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("timeout_seconds must be greater than 0"));
        }

        Ok(())
    }
}

/// Summarization model configuration. Without an API key the pipeline
/// falls back to the built-in rule-based summarizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_seconds: 60,
        }
    }
}

impl SummaryConfig {
    pub fn credentials_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Validate summary configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(anyhow::anyhow!("summary base_url must be an HTTP url"));
        }

        if self.model.is_empty() {
            return Err(anyhow::anyhow!("summary model must not be empty"));
        }

        if self.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("timeout_seconds must be greater than 0"));
        }

        Ok(())
    }
}

use serde::{Deserialize, Serialize};

use crate::errors::SyncError;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Testing,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn parse(env: &str) -> Result<Self, SyncError> {
        match env.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(SyncError::Configuration(format!(
                "invalid environment: {env}"
            ))),
        }
    }

    /// Get current environment from the APP_ENV variable, defaulting to
    /// development when unset.
    pub fn current() -> Result<Self, SyncError> {
        std::env::var("APP_ENV")
            .map(|s| Self::parse(&s))
            .unwrap_or(Ok(Environment::Development))
    }

    /// Check if environment is production
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Check if environment is development
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

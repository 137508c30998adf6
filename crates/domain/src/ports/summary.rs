use async_trait::async_trait;

use roomsync_core::SyncResult;

use crate::value_objects::TokenUsage;

/// One summarization request: a fixed instruction plus the content to
/// condense
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRequest {
    pub instruction: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutput {
    pub text: String,
    pub usage: TokenUsage,
}

/// Language-model abstraction behind the summarization pipeline
#[async_trait]
pub trait SummaryModel: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> SyncResult<SummaryOutput>;
}

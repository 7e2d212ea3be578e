pub mod gemini;
pub mod json;

use crate::error::AnalysisError;
use crate::prompt::PromptPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// One completion for the payload. Returns the raw reply text.
    async fn complete(&self, payload: &PromptPayload) -> Result<String, AnalysisError>;
}

/// Sends the payload once and parses the reply as JSON. No retries.
pub async fn analyze(
    client: &dyn LlmClient,
    payload: &PromptPayload,
) -> Result<serde_json::Value, AnalysisError> {
    let text = client.complete(payload).await?;
    json::parse_response(&text)
}

#[async_trait::async_trait]
impl<T: LlmClient + ?Sized> LlmClient for std::sync::Arc<T> {
    fn provider(&self) -> Provider {
        (**self).provider()
    }

    async fn complete(&self, payload: &PromptPayload) -> Result<String, AnalysisError> {
        (**self).complete(payload).await
    }
}

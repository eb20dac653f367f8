use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::AgentError;

/// Contract the core requires from the generation backend. Every call is a
/// suspension point; dropping the future cancels the in-flight request.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Plain completion of a system/user prompt pair.
    async fn complete(&self, system: &str, user: &str) -> Result<String, AgentError>;

    /// Completion constrained to a JSON object. The returned value is the
    /// decoded body; schema validation against a capability's payload type
    /// happens in the extractor.
    async fn complete_json(&self, system: &str, user: &str) -> Result<Value, AgentError>;

    /// Streaming completion: incremental text fragments are pushed into
    /// `tokens` as they arrive and the full text is returned at the end.
    /// A closed `tokens` channel means the consumer went away;
    /// implementations abandon the in-flight request and return
    /// [`AgentError::Cancelled`] instead of draining it.
    async fn complete_streaming(
        &self,
        system: &str,
        user: &str,
        tokens: mpsc::Sender<String>,
    ) -> Result<String, AgentError>;
}

//! Test doubles shared by the crate's unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::AgentError;
use crate::llm::LlmClient;

/// Backend stub that replays a fixed script of replies in order. An
/// exhausted script behaves like an unavailable backend.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<&str>) -> Self {
        Self { replies: Mutex::new(replies.into_iter().map(str::to_string).collect()) }
    }

    fn next_reply(&self) -> Result<String, AgentError> {
        self.replies
            .lock()
            .expect("script lock")
            .pop_front()
            .ok_or_else(|| AgentError::Backend("scripted backend exhausted".to_string()))
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, AgentError> {
        self.next_reply()
    }

    async fn complete_json(&self, _system: &str, _user: &str) -> Result<Value, AgentError> {
        let reply = self.next_reply()?;
        serde_json::from_str(&reply).map_err(|error| {
            AgentError::SchemaValidation(format!("backend returned non-JSON payload: {error}"))
        })
    }

    async fn complete_streaming(
        &self,
        _system: &str,
        _user: &str,
        tokens: mpsc::Sender<String>,
    ) -> Result<String, AgentError> {
        let reply = self.next_reply()?;
        // Emit in two fragments so interleaving with lifecycle events is
        // observable in tests.
        let midpoint = reply
            .char_indices()
            .nth(reply.chars().count() / 2)
            .map(|(index, _)| index)
            .unwrap_or(0);
        for fragment in [&reply[..midpoint], &reply[midpoint..]] {
            if tokens.send(fragment.to_string()).await.is_err() {
                return Err(AgentError::Cancelled);
            }
        }
        Ok(reply)
    }
}

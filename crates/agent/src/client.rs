//! OpenAI-compatible chat-completions client (DeepSeek and friends).

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use minuteman_core::config::LlmConfig;

use crate::error::AgentError;
use crate::llm::LlmClient;

/// The ReAct selection prompt must stop before the model invents its own
/// observation; harmless for extraction prompts, which never emit it.
const STOP_SEQUENCE: &str = "\nObservation:";

pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_retries: u32,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &LlmConfig) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| AgentError::Backend(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.as_ref().map(|key| key.expose_secret().to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    fn request_body(&self, system: &str, user: &str, stream: bool, json_mode: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "stream": stream,
            "stop": [STOP_SEQUENCE],
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, AgentError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut attempt = 0u32;
        loop {
            let mut request = self.client.post(&url).json(body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let outcome = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    (retryable, format!("backend returned {status}: {text}"))
                }
                Err(error) => (true, format!("request to {url} failed: {error}")),
            };

            let (retryable, message) = outcome;
            if !retryable || attempt >= self.max_retries {
                return Err(AgentError::Backend(message));
            }
            attempt += 1;
            warn!(attempt, max_retries = self.max_retries, "retrying backend call: {message}");
            tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
        }
    }

    fn first_choice_content(payload: &Value) -> Result<String, AgentError> {
        payload["choices"]
            .get(0)
            .and_then(|choice| choice["message"]["content"].as_str())
            .map(|content| content.to_string())
            .ok_or_else(|| AgentError::Backend("no choices in backend response".to_string()))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AgentError> {
        let body = self.request_body(system, user, false, false);
        let response = self.post(&body).await?;
        let payload: Value = response
            .json()
            .await
            .map_err(|error| AgentError::Backend(format!("undecodable response body: {error}")))?;
        Self::first_choice_content(&payload)
    }

    async fn complete_json(&self, system: &str, user: &str) -> Result<Value, AgentError> {
        let body = self.request_body(system, user, false, true);
        let response = self.post(&body).await?;
        let payload: Value = response
            .json()
            .await
            .map_err(|error| AgentError::Backend(format!("undecodable response body: {error}")))?;
        let content = Self::first_choice_content(&payload)?;
        serde_json::from_str(&content).map_err(|error| {
            AgentError::SchemaValidation(format!("backend returned non-JSON payload: {error}"))
        })
    }

    async fn complete_streaming(
        &self,
        system: &str,
        user: &str,
        tokens: mpsc::Sender<String>,
    ) -> Result<String, AgentError> {
        let body = self.request_body(system, user, true, false);
        let response = self.post(&body).await?;

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut full_text = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|error| AgentError::Backend(format!("stream interrupted: {error}")))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(boundary) = buffer.find('\n') {
                let line = buffer[..boundary].trim().to_string();
                buffer.drain(..=boundary);

                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() || data == "[DONE]" {
                    continue;
                }

                let event: Value = match serde_json::from_str(data) {
                    Ok(event) => event,
                    Err(error) => {
                        debug!("skipping undecodable stream event: {error}");
                        continue;
                    }
                };
                if let Some(fragment) =
                    event["choices"].get(0).and_then(|choice| choice["delta"]["content"].as_str())
                {
                    if !fragment.is_empty() {
                        full_text.push_str(fragment);
                        if tokens.send(fragment.to_string()).await.is_err() {
                            // Consumer gone: dropping the response stream
                            // aborts the HTTP request instead of draining it.
                            return Err(AgentError::Cancelled);
                        }
                    }
                }
            }
        }

        Ok(full_text)
    }
}

#[cfg(test)]
mod tests {
    use minuteman_core::config::LlmConfig;

    use super::OpenAiCompatibleClient;

    fn config() -> LlmConfig {
        LlmConfig {
            api_key: Some("test-key".to_string().into()),
            base_url: "https://api.deepseek.com/".to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.0,
            timeout_secs: 30,
            max_retries: 2,
        }
    }

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let client = OpenAiCompatibleClient::new(&config()).expect("build client");
        assert!(!client.base_url.ends_with('/'));
    }

    #[test]
    fn json_mode_sets_response_format() {
        let client = OpenAiCompatibleClient::new(&config()).expect("build client");
        let body = client.request_body("sys", "user", false, true);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["stream"], false);
    }
}

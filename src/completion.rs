//! Completion-service client.
//!
//! Talks to an OpenAI-compatible `chat/completions` endpoint (the hosted
//! service the answering engine grounds its answers with). The client is
//! a narrow interface: prompt in, generated text out; model internals are
//! out of scope.
//!
//! Transient failures (HTTP 429, 5xx, network errors) are retried with
//! bounded exponential backoff; other client errors fail immediately.
//! Requests are bounded by a timeout — a timeout is an error, never a
//! silent empty result.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::classify::GenerationParams;
use crate::config::CompletionConfig;

/// The narrow completion interface the answering engine depends on.
/// Production uses [`CompletionClient`]; tests substitute scripted fakes.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str, params: GenerationParams) -> Result<String>;
}

pub struct CompletionClient {
    base_url: String,
    model: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl CompletionClient {
    /// Create the client from configuration.
    ///
    /// Fails when the API key environment variable (default
    /// `GROQ_API_KEY`) is not set.
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!("{} environment variable not set", config.api_key_env)
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl Completer for CompletionClient {
    /// Generate a completion for `prompt` with the classification-selected
    /// parameters.
    async fn complete(&self, prompt: &str, params: GenerationParams) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_completion_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "completion API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("completion API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("completion failed after retries")))
    }
}

/// Extract `choices[0].message.content` from a chat-completions response.
fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("invalid completion response: missing message content"))
}

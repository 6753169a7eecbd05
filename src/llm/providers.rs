use super::{ChatMessage, Llm, LlmConfig, LlmProvider, LlmResponse};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// OpenAI-style chat completion response, shared by both providers since
/// local servers speak the same protocol.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

fn build_client(timeout_seconds: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()?)
}

async fn parse_completion(response: reqwest::Response, who: &str) -> Result<LlmResponse> {
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(anyhow!("{} API error {}: {}", who, status, text));
    }

    let completion: ChatCompletionResponse = response.json().await?;
    let content = completion
        .choices
        .first()
        .ok_or_else(|| anyhow!("no completion choices from {}", who))?
        .message
        .content
        .clone();

    Ok(LlmResponse {
        content,
        tokens_used: completion.usage.map(|u| u.total_tokens),
    })
}

/// Provider for OpenAI-compatible local endpoints (LM Studio, Ollama).
pub struct LocalProvider {
    config: LlmConfig,
    client: reqwest::Client,
}

impl LocalProvider {
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.endpoint.is_none() {
            return Err(anyhow!("local LLM endpoint not configured"));
        }
        let client = build_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl Llm for LocalProvider {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LlmResponse> {
        let endpoint = self
            .config
            .endpoint
            .as_ref()
            .ok_or_else(|| anyhow!("local LLM endpoint not configured"))?;

        debug!("sending chat request to local LLM at {}", endpoint);

        let response = self
            .client
            .post(endpoint)
            .json(&json!({
                "model": self.config.model,
                "messages": messages,
                "max_tokens": self.config.max_tokens,
                "temperature": self.config.temperature,
            }))
            .send()
            .await?;

        parse_completion(response, "local LLM").await
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::Local
    }
}

/// Provider for the hosted OpenAI API.
pub struct OpenAiProvider {
    config: LlmConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.api_key.is_none() {
            return Err(anyhow!("OpenAI API key required"));
        }
        let client = build_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl Llm for OpenAiProvider {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LlmResponse> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("OpenAI API key not configured"))?;
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .unwrap_or("https://api.openai.com/v1/chat/completions");

        debug!("sending chat request to OpenAI");

        let response = self
            .client
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&json!({
                "model": self.config.model,
                "messages": messages,
                "max_tokens": self.config.max_tokens,
                "temperature": self.config.temperature,
            }))
            .send()
            .await?;

        parse_completion(response, "OpenAI").await
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::OpenAi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_provider_requires_api_key() {
        let config = LlmConfig {
            provider: LlmProvider::OpenAi,
            api_key: None,
            ..LlmConfig::default()
        };
        assert!(OpenAiProvider::new(config).is_err());
    }

    #[test]
    fn test_local_provider_requires_endpoint() {
        let config = LlmConfig {
            endpoint: None,
            ..LlmConfig::default()
        };
        assert!(LocalProvider::new(config).is_err());
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use mt_core::error::GenerationError;
use mt_core::ports::TextGenerator;

const SYSTEM_PROMPT: &str = "You have to create short emails.";
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 500;

/// Configuration for the chat-completion text service client.
#[derive(Debug, Clone)]
pub struct TextGenConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl TextGenConfig {
    pub fn new(endpoint: String, api_key: String, model: String, timeout_ms: u64) -> Self {
        Self {
            endpoint,
            api_key,
            model,
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct ChatCompletionClient {
    config: TextGenConfig,
    http: reqwest::Client,
}

impl ChatCompletionClient {
    pub fn new(config: TextGenConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build text service http client")?;
        Ok(Self { config, http })
    }
}

fn classify(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Service(e.to_string())
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let start = std::time::Instant::now();
        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "text service returned error status");
            return Err(GenerationError::Service(format!("status {status}: {body}")));
        }

        let parsed: ChatResponse = response.json().await.map_err(classify)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Service("no choices in response".into()))?;

        debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            chars = content.len(),
            "text generation completed"
        );
        Ok(content)
    }
}

/// Mock implementation for testing and scaffolding
#[derive(Default)]
pub struct MockTextGenerator;

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Ok("Hello,\n\nThis is a canned body.\nRegards".to_string())
    }
}

/// Smart constructor for mock implementation
pub fn mock_generator() -> Arc<dyn TextGenerator> {
    Arc::new(MockTextGenerator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_generator() -> Result<()> {
        let generator = mock_generator();
        let body = generator.generate("say hello").await?;
        assert!(body.contains("canned body"));
        Ok(())
    }

    #[test]
    fn chat_response_parses_service_shape() {
        let json = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "Hi there"}}
            ],
            "model": "mixtral-8x7b-32768"
        }"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content, "Hi there");
    }

    #[test]
    fn chat_request_serializes_prompt_pair() {
        let request = ChatRequest {
            model: "m",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: "write a launch email",
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "write a launch email");
        assert_eq!(value["max_tokens"], 500);
    }
}

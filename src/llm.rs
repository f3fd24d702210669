//! Language model collaborator
//!
//! The assistant only needs "prompt in, text out". [`ChatCompletionModel`]
//! provides that over any OpenAI-compatible `/chat/completions` endpoint
//! (the Hugging Face router by default).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::{Error, Result};

/// Failure producing a response
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No response within the deadline
    #[error("generation timed out")]
    Timeout,

    /// Backend rejected the request or was unreachable
    #[error("backend error: {0}")]
    Backend(String),

    /// Backend answered without any text
    #[error("empty response")]
    EmptyResponse,
}

/// Produces text for a prompt
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a response to `prompt`
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] describing why no text was produced
    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
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
    content: Option<String>,
}

/// Chat-completions client
pub struct ChatCompletionModel {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    model: String,
    system_prompt: String,
    max_tokens: u32,
}

impl ChatCompletionModel {
    /// Create a client for `model` at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    pub fn new(
        api_key: SecretString,
        base_url: &str,
        model: String,
        system_prompt: String,
        max_tokens: u32,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Llm("API key required".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model,
            system_prompt,
            max_tokens,
        })
    }

    /// Create a client from the assistant configuration
    ///
    /// # Errors
    ///
    /// Returns error if no Hugging Face key is configured
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .api_keys
            .huggingface
            .as_ref()
            .map(|k| SecretString::from(k.expose_secret().to_string()))
            .ok_or_else(|| {
                Error::Config(
                    "HUGGINGFACE_API_KEY (or HF_TOKEN) required for the language model"
                        .to_string(),
                )
            })?;

        tracing::debug!(model = %config.llm.model, base_url = %config.llm.base_url, "language model configured");

        Self::new(
            api_key,
            &config.llm.base_url,
            config.llm.model.clone(),
            build_system_prompt(&config.system_name, &config.user_name),
            config.llm.max_tokens,
            config.llm.timeout,
        )
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionModel {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Backend(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat completion error");
            return Err(GenerationError::Backend(format!("{status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Backend(format!("invalid response: {e}")))?;

        extract_text(parsed)
    }
}

fn extract_text(response: ChatResponse) -> std::result::Result<String, GenerationError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(GenerationError::EmptyResponse)
}

/// Build system prompt
#[must_use]
pub fn build_system_prompt(system_name: &str, user_name: &str) -> String {
    format!(
        "You are {system_name}, a voice assistant for {user_name}. \
         Keep responses concise and conversational."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  It is noon. "}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "It is noon.");
    }

    #[test]
    fn test_extract_text_empty() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(extract_text(parsed), Err(GenerationError::EmptyResponse)));

        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(matches!(extract_text(parsed), Err(GenerationError::EmptyResponse)));
    }

    #[test]
    fn test_empty_key_rejected() {
        let result = ChatCompletionModel::new(
            SecretString::from(String::new()),
            "https://example.invalid/v1",
            "model".to_string(),
            build_system_prompt("JARVIS", "User"),
            150,
            std::time::Duration::from_secs(1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_system_prompt() {
        let prompt = build_system_prompt("JARVIS", "Tony");
        assert!(prompt.starts_with("You are JARVIS"));
        assert!(prompt.contains("Tony"));
    }
}

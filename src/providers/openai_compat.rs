//! OpenAI-compatible provider
//!
//! Works with any server that implements the OpenAI chat and text
//! completion endpoints: Ollama, llama.cpp, vLLM, LM Studio, LocalAI...
//!
//! # Configuration
//!
//! ```toml
//! [server]
//! ip = "10.147.17.1"
//! port = 11434
//! model = "llama3.2"
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::config::ServerConfig;

use super::{ChatMessage, CompletionBackend, ProviderError, Sampling};

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

/// Text completion request
#[derive(Debug, Serialize)]
struct TextCompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
    stop: &'a [String],
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Text completion response
#[derive(Debug, Deserialize)]
struct TextCompletionResponse {
    choices: Vec<TextChoice>,
}

#[derive(Debug, Deserialize)]
struct TextChoice {
    #[serde(default)]
    text: Option<String>,
}

/// Error response from API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone)]
pub struct OpenAICompatConfig {
    /// Base URL for the API (e.g., http://localhost:11434/v1)
    pub base_url: String,
    /// API key sent as a bearer token
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl OpenAICompatConfig {
    /// Create config for a local server
    pub fn local(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            timeout_secs: 300, // Local inference can be slower
        }
    }
}

impl From<&ServerConfig> for OpenAICompatConfig {
    fn from(server: &ServerConfig) -> Self {
        Self {
            base_url: server.base_url(),
            api_key: Some(server.api_key.clone()),
            model: server.model.clone(),
            timeout_secs: server.timeout_secs,
        }
    }
}

/// OpenAI-compatible API provider
pub struct OpenAICompatProvider {
    config: OpenAICompatConfig,
    client: Client,
    host: String,
}

impl OpenAICompatProvider {
    /// Create a new provider with the given configuration
    pub fn new(mut config: OpenAICompatConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        config.base_url = config.base_url.trim_end_matches('/').to_string();
        let host = Url::parse(&config.base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| config.base_url.clone());

        Ok(Self {
            config,
            client,
            host,
        })
    }

    /// Create provider from server connection settings
    pub fn from_server(server: &ServerConfig) -> Result<Self, ProviderError> {
        Self::new(OpenAICompatConfig::from(server))
    }

    /// POST `body` to `{base_url}/{endpoint}` and decode the success body
    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.config.base_url, endpoint);

        let mut req_builder = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        tracing::debug!(url = %url, model = %self.config.model, "Sending completion request");

        let response = req_builder
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(error_resp) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(ProviderError::InvalidResponse(format!(
                    "API error: {}",
                    error_resp.error.message
                )));
            }
            return Err(ProviderError::InvalidResponse(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse response: {} - Body: {}", e, body))
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAICompatProvider {
    fn host(&self) -> &str {
        &self.host
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        sampling: Sampling,
    ) -> Result<String, ProviderError> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
        };

        let completion: ChatCompletionResponse = self.post("chat/completions", &request).await?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    async fn complete(
        &self,
        prompt: &str,
        stop: &[String],
        sampling: Sampling,
    ) -> Result<String, ProviderError> {
        let request = TextCompletionRequest {
            model: &self.config.model,
            prompt,
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
            stop,
        };

        let completion: TextCompletionResponse = self.post("completions", &request).await?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        Ok(choice.text.unwrap_or_default())
    }
}

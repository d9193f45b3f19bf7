//! Remote completion backends

pub mod openai_compat;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use openai_compat::{OpenAICompatConfig, OpenAICompatProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// One role/content pair as sent over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Sampling parameters shared by both request shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A text-generation service the engine can talk to.
///
/// Both methods return the raw generated text, which may be empty.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Host the backend connects to, shown to users when a call fails
    fn host(&self) -> &str;

    /// Chat form: ordered role/content pairs
    async fn chat(
        &self,
        messages: &[ChatMessage],
        sampling: Sampling,
    ) -> Result<String, ProviderError>;

    /// Completion form: one rendered prompt plus stop strings
    async fn complete(
        &self,
        prompt: &str,
        stop: &[String],
        sampling: Sampling,
    ) -> Result<String, ProviderError>;
}

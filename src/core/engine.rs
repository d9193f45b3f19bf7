//! Conversation engine
//!
//! The ConversationEngine owns one persona's dialogue. Each turn it:
//! 1. Appends the user's line to history
//! 2. Renders the history with the configured strategy
//! 3. Calls the completion backend
//! 4. Appends the reply and rewrites the memory file
//!
//! Remote failures never escape `submit`; they come back as an in-world
//! error line so the session can continue. Storage failures do escape.
//!
//! Two engines pointed at the same save directory and persona will race on
//! the memory file. There is no locking; that setup is unsupported.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, Persona};
use crate::conversation::{History, Message};
use crate::providers::{CompletionBackend, ProviderError, Sampling};

use super::render::Rendered;
use super::store::{HistoryStore, StoreError};

/// Reply used when the backend returns nothing but whitespace
pub const EMPTY_REPLY_FALLBACK: &str = "*Stares silently*";

/// What to do with the user's turn when the remote call fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep the unanswered turn in memory; it is saved with the next success
    #[default]
    Retain,
    /// Drop the unanswered turn so history never holds an orphan
    Rollback,
}

/// Errors from the conversation engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// One persona's conversation state
pub struct ConversationEngine {
    persona: Persona,
    config: EngineConfig,
    backend: Arc<dyn CompletionBackend>,
    store: HistoryStore,
    history: History,
}

impl ConversationEngine {
    /// Open the persona's memory under `config.save_dir`.
    ///
    /// A missing or unreadable memory file yields a freshly seeded history.
    /// Only failure to create the save directory is an error.
    pub async fn new(
        persona: Persona,
        config: EngineConfig,
        backend: Arc<dyn CompletionBackend>,
    ) -> Result<Self, EngineError> {
        let store = HistoryStore::open(&config.save_dir, &persona.name).await?;
        let history = Self::load_history(&store, &persona).await;

        Ok(Self {
            persona,
            config,
            backend,
            store,
            history,
        })
    }

    async fn load_history(store: &HistoryStore, persona: &Persona) -> History {
        match store.load().await {
            Ok(Some(messages)) => match History::from_messages(messages) {
                Some(history) => {
                    tracing::info!(
                        persona = %persona.name,
                        messages = history.len(),
                        "Memory loaded"
                    );
                    history
                }
                None => {
                    tracing::warn!(
                        persona = %persona.name,
                        path = %store.path().display(),
                        "Memory file holds no messages, reseeding"
                    );
                    History::seeded(persona)
                }
            },
            Ok(None) => History::seeded(persona),
            Err(e) => {
                tracing::warn!(
                    persona = %persona.name,
                    path = %store.path().display(),
                    error = %e,
                    "Error loading memory, reseeding"
                );
                History::seeded(persona)
            }
        }
    }

    /// Send a line at the configured temperature and return the persona's reply
    pub async fn submit(&mut self, user_text: &str) -> Result<String, EngineError> {
        let temperature = self.config.temperature;
        self.submit_with_temperature(user_text, temperature).await
    }

    /// Send a line at `temperature` and return the persona's reply
    pub async fn submit_with_temperature(
        &mut self,
        user_text: &str,
        temperature: f32,
    ) -> Result<String, EngineError> {
        self.history.add_user(user_text);

        tracing::debug!(
            persona = %self.persona.name,
            host = %self.backend.host(),
            strategy = ?self.config.strategy,
            "Sending turn"
        );

        let reply = match self.request(temperature).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(
                    persona = %self.persona.name,
                    host = %self.backend.host(),
                    error = %e,
                    "Completion request failed"
                );
                if self.config.on_failure == FailurePolicy::Rollback {
                    self.history.pop_unanswered();
                }
                return Ok(format!(
                    "[System Error: Connection to {} failed. {}]",
                    self.backend.host(),
                    e
                ));
            }
        };

        let reply = if reply.trim().is_empty() {
            tracing::warn!(persona = %self.persona.name, "Received empty response from server");
            EMPTY_REPLY_FALLBACK.to_string()
        } else {
            reply
        };

        self.history.add_assistant(&reply);
        self.persist().await?;

        Ok(reply)
    }

    async fn request(&self, temperature: f32) -> Result<String, ProviderError> {
        let sampling = Sampling {
            temperature,
            max_tokens: self.config.max_tokens,
        };

        let rendered = self.config.strategy.render(
            &self.history,
            &self.persona.name,
            self.config.instruction_role,
        );

        match rendered {
            Rendered::Chat(messages) => self.backend.chat(&messages, sampling).await,
            // Completions usually open with a space after the `{persona}:` cue
            Rendered::Prompt { prompt, stop } => self
                .backend
                .complete(&prompt, &stop, sampling)
                .await
                .map(|text| text.trim().to_string()),
        }
    }

    /// Wipe the memory file and start over from the instruction seed
    pub async fn reset(&mut self) -> Result<(), EngineError> {
        self.store.remove().await?;
        self.history = History::seeded(&self.persona);
        tracing::info!(persona = %self.persona.name, "Memory wiped");
        Ok(())
    }

    /// Write the full history to the memory file
    pub async fn persist(&self) -> Result<(), EngineError> {
        self.store.save(self.history.messages()).await?;
        Ok(())
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn history(&self) -> &[Message] {
        self.history.messages()
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }
}

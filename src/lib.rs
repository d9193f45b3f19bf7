//! NPC Voice Box
//!
//! Persistent, in-character conversations with predefined personas, backed
//! by any OpenAI-compatible completion server. Each persona's dialogue is
//! kept in a JSON memory file and replayed on every turn.

pub mod config;
pub mod conversation;
pub mod core;
pub mod providers;

pub use config::{Config, ConfigError, EngineConfig, Persona, Roster, ServerConfig};
pub use conversation::{History, Message, Role};
pub use crate::core::{ConversationEngine, EngineError, FailurePolicy, RenderStrategy};
pub use providers::{CompletionBackend, OpenAICompatProvider, ProviderError};

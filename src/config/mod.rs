//! Application configuration
//!
//! Settings come from a TOML file with environment overrides layered on
//! top. They are read once at startup and handed to the engine by value.
//!
//! ```toml
//! [server]
//! ip = "10.147.17.1"
//! port = 11434
//! model = "llama3.2"
//!
//! [engine]
//! strategy = "chat"
//! on_failure = "retain"
//! ```

pub mod roster;

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{FailurePolicy, InstructionRole, RenderStrategy};

pub use roster::{Persona, Roster, RosterError};

/// Placeholder credential sent to local OpenAI-compatible servers
pub const DEFAULT_API_KEY: &str = "ollama";

/// Sampling temperature used when the caller does not pick one
pub const DEFAULT_TEMPERATURE: f32 = 0.8;

/// Cap on generated tokens per reply
pub const DEFAULT_MAX_TOKENS: u32 = 150;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
}

/// Connection settings for the completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub ip: String,
    pub port: u16,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl ServerConfig {
    pub fn new(ip: impl Into<String>, port: u16, model: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port,
            model: model.into(),
            api_key: DEFAULT_API_KEY.to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// `http://<ip>:<port>/v1`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/v1", self.ip, self.port)
    }
}

/// Behavior of the conversation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding one memory file per persona
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,

    /// How history is rendered for the remote service
    #[serde(default)]
    pub strategy: RenderStrategy,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Wire role for the instruction seed under the chat strategy
    #[serde(default)]
    pub instruction_role: InstructionRole,

    /// What happens to the user turn when the remote call fails
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

impl EngineConfig {
    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = dir.into();
        self
    }

    pub fn with_strategy(mut self, strategy: RenderStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            strategy: RenderStrategy::default(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            instruction_role: InstructionRole::default(),
            on_failure: FailurePolicy::default(),
        }
    }
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("npc_saves")
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_timeout_secs() -> u64 {
    120
}

/// File shape before required fields are checked
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    engine: EngineConfig,
}

#[derive(Debug, Default, Deserialize)]
struct RawServer {
    ip: Option<String>,
    port: Option<u16>,
    model: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

impl Config {
    /// Load from `path` (if it exists) and apply process environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = if path.exists() {
            Some(std::fs::read_to_string(path)?)
        } else {
            tracing::debug!(path = %path.display(), "Config file not found, using environment only");
            None
        };
        Self::resolve(content.as_deref(), |key| env::var(key).ok())
    }

    /// Parse a TOML string without consulting the environment.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Self::resolve(Some(content), |_| None)
    }

    fn resolve(
        content: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut raw: RawConfig = match content {
            Some(content) => toml::from_str(content)?,
            None => RawConfig::default(),
        };

        if let Some(ip) = lookup("NPC_SERVER_IP") {
            raw.server.ip = Some(ip);
        }
        if let Some(port) = lookup("NPC_SERVER_PORT") {
            let port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("NPC_SERVER_PORT is not a port: {port}")))?;
            raw.server.port = Some(port);
        }
        if let Some(model) = lookup("NPC_SERVER_MODEL") {
            raw.server.model = Some(model);
        }
        if let Some(key) = lookup("NPC_API_KEY") {
            raw.server.api_key = Some(key);
        }
        if let Some(dir) = lookup("NPC_SAVE_DIR") {
            raw.engine.save_dir = PathBuf::from(dir);
        }

        let server = ServerConfig {
            ip: raw
                .server
                .ip
                .filter(|ip| !ip.trim().is_empty())
                .ok_or(ConfigError::Missing("server.ip"))?,
            port: raw.server.port.ok_or(ConfigError::Missing("server.port"))?,
            model: raw
                .server
                .model
                .filter(|model| !model.trim().is_empty())
                .ok_or(ConfigError::Missing("server.model"))?,
            api_key: raw
                .server
                .api_key
                .unwrap_or_else(|| DEFAULT_API_KEY.to_string()),
            timeout_secs: raw.server.timeout_secs.unwrap_or_else(default_timeout_secs),
        };

        if !(0.0..=2.0).contains(&raw.engine.temperature) {
            return Err(ConfigError::Invalid(format!(
                "engine.temperature must be within 0.0..=2.0, got {}",
                raw.engine.temperature
            )));
        }

        Ok(Self {
            server,
            engine: raw.engine,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

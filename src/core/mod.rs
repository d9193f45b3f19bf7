//! Core conversation engine components
//!
//! History rendering, persistence, and the engine that ties them to a
//! completion backend.

mod engine;
mod render;
mod store;

pub use engine::{ConversationEngine, EngineError, FailurePolicy, EMPTY_REPLY_FALLBACK};
pub use render::{InstructionRole, RenderStrategy, Rendered, STOP_SEQUENCES};
pub use store::{HistoryStore, LoadError, StoreError};

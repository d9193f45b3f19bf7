//! Rendering history into a request for the remote service

use serde::{Deserialize, Serialize};

use crate::conversation::{Message, Role};
use crate::providers::ChatMessage;

/// Stop strings that keep the generator from speaking past its own turn
pub const STOP_SEQUENCES: [&str; 3] = ["User:", "System:", "\n\n"];

/// How a history is turned into a request. One is chosen per deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStrategy {
    /// Role/content pairs for `/chat/completions`
    #[default]
    Chat,
    /// A single transcript prompt for `/completions`
    Completion,
}

/// Wire role used for the instruction seed in chat requests.
///
/// Many role-play models ignore `system` turns, so the seed goes out as a
/// `user` turn unless configured otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionRole {
    #[default]
    User,
    System,
}

impl InstructionRole {
    fn as_str(self) -> &'static str {
        match self {
            InstructionRole::User => "user",
            InstructionRole::System => "system",
        }
    }
}

/// A history ready to send
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Chat(Vec<ChatMessage>),
    Prompt { prompt: String, stop: Vec<String> },
}

impl RenderStrategy {
    pub fn render(
        self,
        messages: &[Message],
        persona_name: &str,
        instruction_role: InstructionRole,
    ) -> Rendered {
        match self {
            RenderStrategy::Chat => Rendered::Chat(render_chat(messages, instruction_role)),
            RenderStrategy::Completion => Rendered::Prompt {
                prompt: render_transcript(messages, persona_name),
                stop: STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
            },
        }
    }
}

fn render_chat(messages: &[Message], instruction_role: InstructionRole) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|msg| ChatMessage {
            role: match msg.role {
                Role::Instruction => instruction_role.as_str().to_string(),
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: msg.content.clone(),
        })
        .collect()
}

/// One line per message, closed by a bare `{persona}:` cue
fn render_transcript(messages: &[Message], persona_name: &str) -> String {
    let mut lines: Vec<String> = messages
        .iter()
        .map(|msg| {
            let content = collapse_blank_lines(&msg.content);
            match msg.role {
                Role::Instruction => format!("System: {}", content),
                Role::User => format!("User: {}", content),
                Role::Assistant => format!("{}: {}", persona_name, content),
            }
        })
        .collect();
    lines.push(format!("{}:", persona_name));
    lines.join("\n")
}

/// A blank line inside a message would end the transcript turn early
fn collapse_blank_lines(content: &str) -> String {
    content
        .trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

//! Conversation types and history state

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::config::Persona;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn instruction(content: impl Into<String>) -> Self {
        Self {
            role: Role::Instruction,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Speaker of a message.
///
/// `Instruction` is the role-play seed. Saves that used the conventional
/// `"system"` tag load as `Instruction` as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "system")]
    Instruction,
    User,
    Assistant,
}

/// Ordered dialogue for one persona. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    /// Fresh history holding only the instruction seed for `persona`.
    pub fn seeded(persona: &Persona) -> Self {
        Self {
            messages: vec![seed_message(persona)],
        }
    }

    /// Adopt previously stored messages as-is. Returns `None` for an empty list.
    pub fn from_messages(messages: Vec<Message>) -> Option<Self> {
        if messages.is_empty() {
            None
        } else {
            Some(Self { messages })
        }
    }

    pub fn add_user(&mut self, content: &str) {
        self.messages.push(Message::user(content));
    }

    pub fn add_assistant(&mut self, content: &str) {
        self.messages.push(Message::assistant(content));
    }

    /// Drop the trailing message if it is an unanswered user turn.
    pub fn pop_unanswered(&mut self) -> Option<Message> {
        let unanswered = self.messages.len() > 1
            && self.messages.last().map(|msg| msg.role) == Some(Role::User);
        if unanswered {
            self.messages.pop()
        } else {
            None
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

impl Deref for History {
    type Target = [Message];

    fn deref(&self) -> &Self::Target {
        &self.messages
    }
}

/// Build the role-play preamble that opens every history.
pub fn seed_message(persona: &Persona) -> Message {
    Message::instruction(format!(
        "INSTRUCTIONS: You are roleplaying as {}. {}. Stay in character. Respond briefly.",
        persona.name, persona.bio
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bob() -> Persona {
        Persona::new("Bob", "a grumpy blacksmith")
    }

    #[test]
    fn test_seed_embeds_name_and_bio() {
        let history = History::seeded(&bob());
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::Instruction);
        assert_eq!(
            history[0].content,
            "INSTRUCTIONS: You are roleplaying as Bob. a grumpy blacksmith. Stay in character. Respond briefly."
        );
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Message::instruction("hi")).unwrap();
        assert_eq!(json, r#"{"role":"instruction","content":"hi"}"#);

        let system: Message = serde_json::from_str(r#"{"role":"system","content":"x"}"#).unwrap();
        assert_eq!(system.role, Role::Instruction);

        let unknown = serde_json::from_str::<Message>(r#"{"role":"tool","content":"x"}"#);
        assert!(unknown.is_err());
    }

    #[test]
    fn test_empty_history_rejected() {
        assert!(History::from_messages(Vec::new()).is_none());
    }

    #[test]
    fn test_pop_unanswered_keeps_seed() {
        let mut history = History::seeded(&bob());
        history.add_user("Hello");
        assert_eq!(history.pop_unanswered(), Some(Message::user("Hello")));
        assert_eq!(history.len(), 1);

        history.add_user("Hi");
        history.add_assistant("Bah.");
        assert!(history.pop_unanswered().is_none());
        assert_eq!(history.len(), 3);

        // A stored history may legitimately open with a user message
        let mut lone = History::from_messages(vec![Message::user("seed")]).unwrap();
        assert!(lone.pop_unanswered().is_none());
    }
}

//! Persona roster
//!
//! A handful of personas ship built in. More can be dropped into a directory
//! as TOML files, one persona per file:
//!
//! ```toml
//! [persona]
//! name = "Mira"
//! bio = "A sharp-tongued herbalist who distrusts city folk"
//! ```
//!
//! Files override built-ins that share the same (lower-cased) name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

/// A character the user can talk to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Display name, also used to key the memory file
    pub name: String,

    /// Behavioral description woven into the instruction seed
    pub bio: String,
}

impl Persona {
    pub fn new(name: impl Into<String>, bio: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bio: bio.into(),
        }
    }

    /// Roster lookup key
    pub fn key(&self) -> String {
        self.name.trim().to_lowercase()
    }
}

#[derive(Debug, Deserialize)]
struct PersonaFile {
    persona: Persona,
}

/// Personas available for selection, keyed by lower-cased name
#[derive(Debug, Clone, Default)]
pub struct Roster {
    personas: BTreeMap<String, Persona>,
}

impl Roster {
    /// Roster holding only the built-in cast
    pub fn builtin() -> Self {
        let mut roster = Self::default();
        for (name, bio) in builtin::PERSONAS {
            roster.insert(Persona::new(*name, *bio));
        }
        roster
    }

    pub fn insert(&mut self, persona: Persona) -> Option<Persona> {
        self.personas.insert(persona.key(), persona)
    }

    /// Add every `*.toml` persona file found in `dir`.
    ///
    /// Returns the number of personas loaded.
    pub async fn load_dir(&mut self, dir: &Path) -> Result<usize, RosterError> {
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| RosterError::Io(format!("{}: {}", dir.display(), e)))?;

        let mut loaded = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RosterError::Io(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "toml") {
                continue;
            }
            let persona = Self::load_file(&path).await?;
            tracing::debug!(name = %persona.name, path = %path.display(), "Loaded persona");
            self.insert(persona);
            loaded += 1;
        }

        Ok(loaded)
    }

    /// Parse a single persona file
    pub async fn load_file(path: &Path) -> Result<Persona, RosterError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| RosterError::Io(format!("{}: {}", path.display(), e)))?;

        let file: PersonaFile = toml::from_str(&content)
            .map_err(|e| RosterError::Parse(format!("{}: {}", path.display(), e)))?;
        Ok(file.persona)
    }

    /// Case-insensitive lookup; surrounding whitespace is ignored
    pub fn get(&self, choice: &str) -> Option<&Persona> {
        self.personas.get(&choice.trim().to_lowercase())
    }

    pub fn names(&self) -> Vec<&str> {
        self.personas.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

/// Errors from roster loading
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Personas that don't require files
pub mod builtin {
    /// `(name, bio)` pairs
    pub const PERSONAS: &[(&str, &str)] = &[
        (
            "Bob",
            "A grumpy blacksmith who has worked the same forge for forty years. He is short with strangers, proud of his craft, and secretly soft on stray dogs",
        ),
        (
            "Elara",
            "An elven librarian who speaks in measured, poetic sentences. She guards forbidden tomes and tests visitors with riddles before helping them",
        ),
        (
            "Grix",
            "A goblin merchant who haggles over everything, never gives a straight answer, and refers to himself in the third person",
        ),
        (
            "Captain Reyes",
            "A weathered harbor captain who has seen every kind of trouble the sea can bring. Practical, blunt, and suspicious of anyone asking about the cargo",
        ),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_lookup_is_case_insensitive() {
        let roster = Roster::builtin();
        assert_eq!(roster.len(), builtin::PERSONAS.len());

        let bob = roster.get("  BOB ").unwrap();
        assert_eq!(bob.name, "Bob");
        assert!(roster.get("captain reyes").is_some());
        assert!(roster.get("nobody").is_none());
    }

    #[test]
    fn test_names_are_keys() {
        let roster = Roster::builtin();
        let names = roster.names();
        assert!(names.contains(&"bob"));
        assert!(names.contains(&"captain reyes"));
    }

    #[test]
    fn test_parse_persona_file() {
        let toml_content = r#"
[persona]
name = "Mira"
bio = "A sharp-tongued herbalist"
"#;

        let file: PersonaFile = toml::from_str(toml_content).unwrap();
        assert_eq!(file.persona, Persona::new("Mira", "A sharp-tongued herbalist"));
    }

    #[tokio::test]
    async fn test_load_dir_overrides_builtin() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("bob.toml"),
            "[persona]\nname = \"Bob\"\nbio = \"a cheerful baker\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("mira.toml"),
            "[persona]\nname = \"Mira\"\nbio = \"an herbalist\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut roster = Roster::builtin();
        let loaded = roster.load_dir(dir.path()).await.unwrap();

        assert_eq!(loaded, 2);
        assert_eq!(roster.get("bob").unwrap().bio, "a cheerful baker");
        assert_eq!(roster.get("mira").unwrap().name, "Mira");
    }

    #[tokio::test]
    async fn test_load_dir_errors() {
        let dir = TempDir::new().unwrap();
        let mut roster = Roster::default();

        let missing = roster.load_dir(&dir.path().join("absent")).await;
        assert!(matches!(missing, Err(RosterError::Io(_))));

        std::fs::write(dir.path().join("broken.toml"), "[persona]\nname = 3\n").unwrap();
        let broken = roster.load_dir(dir.path()).await;
        assert!(matches!(broken, Err(RosterError::Parse(_))));
    }
}

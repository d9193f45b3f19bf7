//! JSON file persistence for persona histories
//!
//! Each persona maps to `{save_dir}/{sanitized_name}_memory.json` holding a
//! pretty-printed array of `{ "role", "content" }` records.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::conversation::Message;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create save directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Why a stored history could not be used
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed history: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Memory file for one persona
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Open the store for `persona_name` under `save_dir`, creating the
    /// directory if needed. Does not touch the memory file itself.
    pub async fn open(save_dir: &Path, persona_name: &str) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(save_dir)
            .await
            .map_err(|source| StoreError::CreateDir {
                path: save_dir.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: save_dir.join(file_name(persona_name)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the stored messages. `Ok(None)` when no file exists yet.
    pub async fn load(&self) -> Result<Option<Vec<Message>>, LoadError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let messages: Vec<Message> = serde_json::from_slice(&content)?;
        Ok(Some(messages))
    }

    /// Replace the file contents with `messages`.
    ///
    /// Writes a sibling temp file and renames it over the target, so a crash
    /// leaves either the old file or the new one.
    pub async fn save(&self, messages: &[Message]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(messages)?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|source| StoreError::Write {
                path: tmp.clone(),
                source,
            })?;

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })?;

        Ok(())
    }

    /// Delete the file. A missing file is not an error.
    pub async fn remove(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// `{key}_memory.json` where `key` is the lower-cased, filename-safe persona name
fn file_name(persona_name: &str) -> String {
    format!("{}_memory.json", sanitize_key(persona_name))
}

/// Lower-case and replace anything other than ASCII alphanumerics, `_` and `-` with `_`.
fn sanitize_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sanitize_key_replaces_special_chars() {
        assert_eq!(sanitize_key("Bob"), "bob");
        assert_eq!(sanitize_key("Captain Reyes"), "captain_reyes");
        assert_eq!(sanitize_key("../etc/passwd"), "___etc_passwd");
        assert_eq!(file_name("Grix"), "grix_memory.json");
    }

    #[tokio::test]
    async fn open_creates_nested_dir() {
        let dir = TempDir::new().unwrap();
        let save_dir = dir.path().join("a").join("b");
        let store = HistoryStore::open(&save_dir, "Bob").await.unwrap();

        assert!(save_dir.is_dir());
        assert_eq!(store.path(), save_dir.join("bob_memory.json"));
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn open_fails_when_dir_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("saves");
        std::fs::write(&blocker, "not a dir").unwrap();

        let err = HistoryStore::open(&blocker, "Bob").await.unwrap_err();
        assert!(matches!(err, StoreError::CreateDir { .. }));
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::open(dir.path(), "Bob").await.unwrap();
        let messages = vec![Message::instruction("seed"), Message::user("Hello")];

        store.save(&messages).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(messages));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn saved_file_is_pretty_role_content_array() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::open(dir.path(), "Bob").await.unwrap();
        store.save(&[Message::assistant("Bah.")]).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            raw,
            "[\n  {\n    \"role\": \"assistant\",\n    \"content\": \"Bah.\"\n  }\n]"
        );
    }

    #[tokio::test]
    async fn load_missing_and_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::open(dir.path(), "Bob").await.unwrap();
        assert!(store.load().await.unwrap().is_none());

        std::fs::write(store.path(), b"\x00\xffnot json").unwrap();
        assert!(matches!(store.load().await, Err(LoadError::Parse(_))));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::open(dir.path(), "Bob").await.unwrap();
        store.save(&[Message::user("x")]).await.unwrap();

        tokio_test::assert_ok!(store.remove().await);
        assert!(!store.exists());
        tokio_test::assert_ok!(store.remove().await);
    }

    #[tokio::test]
    async fn save_fails_when_temp_path_is_a_dir() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::open(dir.path(), "Bob").await.unwrap();
        std::fs::create_dir(store.path().with_extension("json.tmp")).unwrap();

        let err = store.save(&[Message::user("x")]).await.unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn remove_fails_when_path_is_a_dir() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::open(dir.path(), "Bob").await.unwrap();
        std::fs::create_dir(store.path()).unwrap();

        let err = store.remove().await.unwrap_err();
        assert!(matches!(err, StoreError::Remove { .. }));
    }
}

//! Transcript persistence: one pretty-printed JSON file per learner.
//!
//! Reads are whole-file; writes go through a temp file in the same
//! directory and an atomic rename, so a crash mid-write leaves the
//! previous transcript intact.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::Message;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Cannot write transcript for '{username}': {source}")]
    Write {
        username: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot serialize transcript for '{username}': {source}")]
    Serialize {
        username: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Store for per-user transcript files under one directory.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// File path for a username. Usernames are sanitized to a safe
    /// character set so they cannot escape the transcript directory.
    pub fn path_for(&self, username: &str) -> PathBuf {
        let safe: String = username
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("chat_history_{safe}.json"))
    }

    /// Load the most recently persisted transcript for a user.
    ///
    /// A missing, unreadable, or corrupt file degrades to an empty
    /// transcript; a learner must always be able to start fresh.
    pub fn load(&self, username: &str) -> Vec<Message> {
        let path = self.path_for(username);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(user = %username, error = %e, "transcript unreadable, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(user = %username, error = %e, "transcript corrupt, starting empty");
                Vec::new()
            }
        }
    }

    /// Overwrite the persisted transcript with the given messages.
    pub fn save(&self, username: &str, messages: &[Message]) -> Result<(), PersistenceError> {
        let path = self.path_for(username);

        std::fs::create_dir_all(&self.dir).map_err(|e| PersistenceError::Write {
            username: username.to_string(),
            source: e,
        })?;

        let json =
            serde_json::to_string_pretty(messages).map_err(|e| PersistenceError::Serialize {
                username: username.to_string(),
                source: e,
            })?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| PersistenceError::Write {
                username: username.to_string(),
                source: e,
            })?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| PersistenceError::Write {
                username: username.to_string(),
                source: e,
            })?;
        tmp.persist(&path).map_err(|e| PersistenceError::Write {
            username: username.to_string(),
            source: e.error,
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;

    fn test_store() -> (TranscriptStore, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        (TranscriptStore::new(tmp.path()), tmp)
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let (store, _tmp) = test_store();
        assert!(store.load("ida").is_empty());
    }

    #[test]
    fn save_then_load_round_trips_in_order() {
        let (store, _tmp) = test_store();
        let messages = vec![
            Message::user("Wie löse ich 3x+2=11?"),
            Message::assistant("Was müsstest du zuerst auf beiden Seiten tun?"),
            Message::user("2 abziehen?"),
        ];
        store.save("ida", &messages).unwrap();
        assert_eq!(store.load("ida"), messages);
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let (store, _tmp) = test_store();
        std::fs::create_dir_all(store.path_for("ida").parent().unwrap()).unwrap();
        std::fs::write(store.path_for("ida"), "{not json[").unwrap();
        assert!(store.load("ida").is_empty());
    }

    #[test]
    fn persisted_file_is_pretty_printed_json_array() {
        let (store, _tmp) = test_store();
        store.save("ida", &[Message::user("hallo")]).unwrap();
        let raw = std::fs::read_to_string(store.path_for("ida")).unwrap();
        assert!(raw.starts_with('['));
        assert!(raw.contains('\n'), "pretty-printed output expected");
        let parsed: Vec<Message> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn save_overwrites_whole_file() {
        let (store, _tmp) = test_store();
        store
            .save("ida", &[Message::user("a"), Message::assistant("b")])
            .unwrap();
        store.save("ida", &[]).unwrap();
        assert!(store.load("ida").is_empty());
        let raw = std::fs::read_to_string(store.path_for("ida")).unwrap();
        assert_eq!(raw.trim(), "[]");
    }

    #[test]
    fn transcripts_are_scoped_per_user() {
        let (store, _tmp) = test_store();
        store.save("ida", &[Message::user("idas frage")]).unwrap();
        store.save("ole", &[Message::user("oles frage")]).unwrap();
        assert_eq!(store.load("ida")[0].content, "idas frage");
        assert_eq!(store.load("ole")[0].content, "oles frage");
    }

    #[test]
    fn hostile_usernames_cannot_escape_the_directory() {
        let (store, tmp) = test_store();
        let path = store.path_for("../../etc/passwd");
        assert!(path.starts_with(tmp.path()));
        assert!(!path.to_string_lossy().contains(".."));
    }

    #[test]
    fn no_temp_files_left_behind_after_save() {
        let (store, tmp) = test_store();
        store.save("ida", &[Message::user("x")]).unwrap();
        let entries: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["chat_history_ida.json".to_string()]);
    }
}

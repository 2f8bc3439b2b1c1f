use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::answers::AnswerSet;

/// Well-known key under which in-progress answers are saved.
pub const ASSESSMENT_PROGRESS_KEY: &str = "assessmentProgress";

/// Durable copy of in-progress answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub saved_at: DateTime<Utc>,
    pub answers: AnswerSet,
}

impl ProgressSnapshot {
    pub fn capture(answers: &AnswerSet) -> Self {
        Self {
            saved_at: Utc::now(),
            answers: answers.clone(),
        }
    }

    /// Accepts the stamped document and the bare answer mapping written by earlier clients.
    pub fn decode(raw: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(match serde_json::from_slice(raw)? {
            StoredProgress::Stamped(snapshot) => snapshot,
            StoredProgress::Bare(answers) => Self {
                saved_at: DateTime::<Utc>::default(),
                answers,
            },
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredProgress {
    Stamped(ProgressSnapshot),
    Bare(AnswerSet),
}

/// Storage abstraction for saved progress. Saves fully replace earlier snapshots.
pub trait ProgressStore: Send + Sync {
    fn save(&self, key: &str, snapshot: &ProgressSnapshot) -> Result<(), PersistenceError>;
    fn load(&self, key: &str) -> Result<Option<ProgressSnapshot>, PersistenceError>;
    fn clear(&self, key: &str) -> Result<(), PersistenceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("progress store unavailable: {0}")]
    Unavailable(#[from] io::Error),
    #[error("saved progress is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("progress key '{0}' is not usable as a storage name")]
    InvalidKey(String),
}

/// One JSON document per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    dir: PathBuf,
}

impl FileProgressStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let usable = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'));
        if !usable {
            return Err(PersistenceError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl ProgressStore for FileProgressStore {
    fn save(&self, key: &str, snapshot: &ProgressSnapshot) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;

        let staging = path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_vec_pretty(snapshot)?)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<ProgressSnapshot>, PersistenceError> {
        let path = self.path_for(key)?;
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(ProgressSnapshot::decode(&raw)?))
    }

    fn clear(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Keeps serialized documents in memory so corrupt payloads behave as on disk.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    documents: Mutex<HashMap<String, String>>,
}

impl MemoryProgressStore {
    pub fn raw(&self, key: &str) -> Option<String> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert_raw(&self, key: &str, document: impl Into<String>) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), document.into());
    }
}

impl ProgressStore for MemoryProgressStore {
    fn save(&self, key: &str, snapshot: &ProgressSnapshot) -> Result<(), PersistenceError> {
        let document = serde_json::to_string(snapshot)?;
        self.insert_raw(key, document);
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<ProgressSnapshot>, PersistenceError> {
        match self.raw(key) {
            Some(document) => Ok(Some(ProgressSnapshot::decode(document.as_bytes())?)),
            None => Ok(None),
        }
    }

    fn clear(&self, key: &str) -> Result<(), PersistenceError> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Fail-soft facade over a [`ProgressStore`] bound to one key.
#[derive(Clone)]
pub struct PersistenceBridge {
    store: Arc<dyn ProgressStore>,
    key: String,
}

impl PersistenceBridge {
    pub fn new(store: Arc<dyn ProgressStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn with_default_key(store: Arc<dyn ProgressStore>) -> Self {
        Self::new(store, ASSESSMENT_PROGRESS_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns whether the snapshot was written; failures are only logged.
    pub fn save(&self, answers: &AnswerSet) -> bool {
        match self.store.save(&self.key, &ProgressSnapshot::capture(answers)) {
            Ok(()) => {
                debug!(key = %self.key, answers = answers.len(), "assessment progress saved");
                true
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "unable to save assessment progress");
                false
            }
        }
    }

    /// Missing, unreadable, and corrupt snapshots all read as "no saved progress".
    pub fn load(&self) -> Option<AnswerSet> {
        match self.store.load(&self.key) {
            Ok(Some(snapshot)) => {
                debug!(key = %self.key, saved_at = %snapshot.saved_at, "assessment progress restored");
                Some(snapshot.answers)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(key = %self.key, error = %err, "ignoring unreadable assessment progress");
                None
            }
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.store.clear(&self.key) {
            warn!(key = %self.key, error = %err, "unable to clear assessment progress");
        }
    }
}

impl std::fmt::Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

//! File-backed session store.
//!
//! Each record lives in its own JSON file named after its key, wrapped in a
//! [`VersionedRecord`]. Writes go to a temporary file that is synced and
//! renamed over the target, so a crash mid-write leaves the previous
//! record intact.

use cud_application::StateStore;
use cud_domain::{
    HistoryEntry, ModelId, PartialSessionState, PersistedSnapshot, TranscriptMessage,
    VersionedRecord,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const MESSAGES_KEY: &str = "cud_messages";
pub const HISTORY_KEY: &str = "cud_history";
pub const CURRENT_MODEL_KEY: &str = "cud_current_model";

const WRITE_CHECK_FILE: &str = ".cud_write_check";

#[derive(Debug, Error)]
enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON for {key}: {source}")]
    Json {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{key} was written with format version {found}")]
    UnsupportedVersion { key: &'static str, found: u32 },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub struct FileStateStore {
    dir: PathBuf,
    max_entries: usize,
    available: bool,
}

impl FileStateStore {
    /// Open the store in `dir`, creating it if needed. If the directory is
    /// not writable the store runs in memory-only mode.
    pub fn new(dir: impl Into<PathBuf>, max_entries: usize) -> Self {
        let dir = dir.into();
        let available = match check_writable(&dir) {
            Ok(()) => {
                debug!("State store at {}", dir.display());
                true
            }
            Err(e) => {
                warn!("Session state will not be saved: {}", e);
                false
            }
        };
        Self {
            dir,
            max_entries,
            available,
        }
    }

    /// Whether records reach the disk
    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn write_record<T: Serialize>(&self, key: &'static str, data: T) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&VersionedRecord::current(data))
            .map_err(|source| StoreError::Json { key, source })?;

        let path = self.path_for(key);
        let tmp_path = self.dir.join(format!(".{key}.json.tmp"));
        let mut tmp_file = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
        tmp_file
            .write_all(&json)
            .and_then(|()| tmp_file.sync_all())
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        drop(tmp_file);

        fs::rename(&tmp_path, &path).map_err(|e| StoreError::io(&path, e))
    }

    fn read_record<T: DeserializeOwned>(&self, key: &'static str) -> Result<Option<T>, StoreError> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }

        let record: VersionedRecord<T> =
            serde_json::from_str(&content).map_err(|source| StoreError::Json { key, source })?;
        if !record.is_current() {
            return Err(StoreError::UnsupportedVersion {
                key,
                found: record.version,
            });
        }
        Ok(Some(record.data))
    }

    /// One record, or `None` with a warning when it cannot be read
    fn load_record<T: DeserializeOwned>(&self, key: &'static str) -> Option<T> {
        self.read_record(key)
            .inspect_err(|e| warn!("Ignoring stored record: {}", e))
            .ok()
            .flatten()
    }
}

impl StateStore for FileStateStore {
    fn save(&self, snapshot: &PersistedSnapshot) {
        if !self.available {
            return;
        }

        let messages = tail(&snapshot.messages, self.max_entries);
        let history = tail(&snapshot.history, self.max_entries);
        let results = [
            self.write_record(MESSAGES_KEY, messages),
            self.write_record(HISTORY_KEY, history),
            self.write_record(CURRENT_MODEL_KEY, &snapshot.current_model),
        ];
        for error in results.into_iter().filter_map(Result::err) {
            warn!("Failed to save session state: {}", error);
        }
    }

    fn load(&self) -> PartialSessionState {
        if !self.available {
            return PartialSessionState::default();
        }

        let state = PartialSessionState {
            messages: self.load_record::<Vec<TranscriptMessage>>(MESSAGES_KEY),
            history: self.load_record::<Vec<HistoryEntry>>(HISTORY_KEY),
            current_model: self.load_record::<ModelId>(CURRENT_MODEL_KEY),
        };
        if !state.is_empty() {
            info!(
                "Loaded session state: {} messages, {} history entries",
                state.messages.as_ref().map_or(0, Vec::len),
                state.history.as_ref().map_or(0, Vec::len)
            );
        }
        state
    }

    fn clear(&self) {
        if !self.available {
            return;
        }
        for key in [MESSAGES_KEY, HISTORY_KEY, CURRENT_MODEL_KEY] {
            let path = self.path_for(key);
            if let Err(e) = fs::remove_file(&path)
                && e.kind() != io::ErrorKind::NotFound
            {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

/// Create `dir` and check that a file can be written into it.
fn check_writable(dir: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    let marker = dir.join(WRITE_CHECK_FILE);
    fs::write(&marker, b"ok").map_err(|e| StoreError::io(&marker, e))?;
    fs::remove_file(&marker).map_err(|e| StoreError::io(&marker, e))
}

fn tail<T>(items: &[T], max: usize) -> &[T] {
    &items[items.len().saturating_sub(max)..]
}

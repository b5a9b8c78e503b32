use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Key the portal has always used for the wizard draft.
pub const DEFAULT_DRAFT_KEY: &str = "documentApplicationForm";

/// Persistence port for a single draft snapshot, standing in for browser local storage.
///
/// Implementations are scoped to one draft key at construction time, so the wizard never
/// reaches for ambient global state.
pub trait DraftStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, StoreError>;
    fn save(&self, snapshot: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("draft store i/o failure at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("draft could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("draft store unavailable: {0}")]
    Unavailable(String),
}

impl<T: DraftStore + ?Sized> DraftStore for Arc<T> {
    fn load(&self) -> Result<Option<String>, StoreError> {
        (**self).load()
    }

    fn save(&self, snapshot: &str) -> Result<(), StoreError> {
        (**self).save(snapshot)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

impl<T: DraftStore + ?Sized> DraftStore for Box<T> {
    fn load(&self) -> Result<Option<String>, StoreError> {
        (**self).load()
    }

    fn save(&self, snapshot: &str) -> Result<(), StoreError> {
        (**self).save(snapshot)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

/// Process-local store; shared through `Arc` so a remount sees the previous snapshot.
#[derive(Debug, Default)]
pub struct InMemoryDraftStore {
    snapshot: Mutex<Option<String>>,
}

impl InMemoryDraftStore {
    pub fn with_snapshot(snapshot: impl Into<String>) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot.into())),
        }
    }

    /// Current raw snapshot, if any.
    pub fn snapshot(&self) -> Option<String> {
        self.load().ok().flatten()
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, StoreError> {
        self.snapshot
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory draft mutex poisoned".to_string()))
    }
}

impl DraftStore for InMemoryDraftStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.guard()?.clone())
    }

    fn save(&self, snapshot: &str) -> Result<(), StoreError> {
        *self.guard()? = Some(snapshot.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.guard()? = None;
        Ok(())
    }
}

/// One JSON file per draft key inside a directory.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    pub fn new(directory: impl AsRef<Path>, key: &str) -> Self {
        let file_name = format!("{}.json", encode_key(key));
        Self {
            path: directory.as_ref().join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl DraftStore for FileDraftStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn save(&self, snapshot: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, snapshot).map_err(|err| self.io_error(err))?;
        fs::rename(&staging, &self.path).map_err(|err| self.io_error(err))
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// Maps a draft key onto a file stem. Bytes outside `[A-Za-z0-9_-]` are percent-escaped,
/// `%` included, so distinct keys never share a file.
fn encode_key(key: &str) -> String {
    if key.is_empty() {
        return DEFAULT_DRAFT_KEY.to_string();
    }

    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

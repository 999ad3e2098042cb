use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};

/// Where the serialized progress collection lives
pub trait StoragePort {
    /// `Ok(None)` when the entry has never been written
    fn load(&self) -> Result<Option<String>>;

    fn save(&self, blob: &str) -> Result<()>;
}

impl<T: StoragePort + ?Sized> StoragePort for Arc<T> {
    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }

    fn save(&self, blob: &str) -> Result<()> {
        (**self).save(blob)
    }
}

/// One JSON file per named entry
pub struct FileStorage {
    dir: PathBuf,
    path: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>, entry_name: &str) -> Self {
        let dir = dir.into();
        let path = dir.join(format!("{}.json", entry_name));
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoragePort for FileStorage {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(Some(content))
    }

    fn save(&self, blob: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        // Write beside the target and rename so readers never see a torn file
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(blob.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| Error::Persist {
            path: self.path.clone(),
            reason: e.error.to_string(),
        })?;

        debug!(path = %self.path.display(), bytes = blob.len(), "Saved progress");
        Ok(())
    }
}

/// In-process entry with an optional byte quota
#[derive(Default)]
pub struct MemoryStorage {
    blob: Mutex<Option<String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(blob.into())),
            quota: None,
        }
    }

    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    pub fn contents(&self) -> Option<String> {
        self.blob.lock().ok().and_then(|b| b.clone())
    }
}

impl StoragePort for MemoryStorage {
    fn load(&self) -> Result<Option<String>> {
        let blob = self
            .blob
            .lock()
            .map_err(|e| Error::Storage(e.to_string()))?;
        Ok(blob.clone())
    }

    fn save(&self, blob: &str) -> Result<()> {
        if let Some(quota) = self.quota {
            if blob.len() > quota {
                return Err(Error::Storage(format!(
                    "quota exceeded ({} > {} bytes)",
                    blob.len(),
                    quota
                )));
            }
        }
        let mut current = self
            .blob
            .lock()
            .map_err(|e| Error::Storage(e.to_string()))?;
        *current = Some(blob.to_string());
        Ok(())
    }
}

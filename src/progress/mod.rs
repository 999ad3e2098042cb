pub mod continue_watching;
pub mod keys;
pub mod models;
pub mod storage;
pub mod store;

pub use continue_watching::{ContinueWatchingEntry, format_watch_time};
pub use keys::{EpisodeKey, StoreKey};
pub use models::{EpisodeProgress, MediaId, MediaProgress, MediaType, ProgressMap, WatchProgress};
pub use storage::{FileStorage, MemoryStorage, StoragePort};
pub use store::{ProgressStore, ProgressUpdate};

use crate::config::Config;
use crate::error::Result;

/// File-backed store configured from `[storage]`
pub fn open(config: &Config) -> Result<ProgressStore<FileStorage>> {
    let dir = config.progress_dir()?;
    let storage = FileStorage::new(dir, &config.storage.entry_name);
    Ok(ProgressStore::new(storage).with_retention(config.storage.retention()))
}

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::progress::continue_watching::{ContinueWatchingEntry, continue_watching};
use crate::progress::keys::{EpisodeKey, StoreKey};
use crate::progress::models::{
    EpisodeProgress, MediaId, MediaProgress, MediaType, ProgressMap, WatchProgress,
};
use crate::progress::storage::StoragePort;

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// JSON has no NaN or infinity, so such values would persist as `null` and
/// make the whole entry unreadable
fn sanitize_seconds(value: f64, field: &'static str) -> f64 {
    if value.is_finite() && value >= 0.0 {
        return value;
    }
    warn!(field, value = %value, "Replacing invalid playback time with 0");
    0.0
}

/// One progress event plus the context of what is playing
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub id: MediaId,
    pub media_type: MediaType,
    pub title: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub watched: f64,
    pub duration: f64,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl ProgressUpdate {
    pub fn new(
        id: impl Into<MediaId>,
        media_type: MediaType,
        title: impl Into<String>,
        watched: f64,
        duration: f64,
    ) -> Self {
        Self {
            id: id.into(),
            media_type,
            title: title.into(),
            poster_path: None,
            backdrop_path: None,
            watched,
            duration,
            season: None,
            episode: None,
        }
    }

    pub fn with_images(mut self, poster_path: Option<String>, backdrop_path: Option<String>) -> Self {
        self.poster_path = poster_path;
        self.backdrop_path = backdrop_path;
        self
    }

    pub fn with_episode(mut self, season: u32, episode: u32) -> Self {
        self.season = Some(season);
        self.episode = Some(episode);
        self
    }
}

/// Watch progress persisted through a storage port.
///
/// Never fails towards its callers: unreadable data reads as an empty
/// collection and rejected writes are logged and dropped. Records older than
/// the retention window are filtered out of every read and physically
/// disappear on the next write.
///
/// `update` and `remove` hold an internal lock across their read-modify-write
/// cycle, so calls through one store never lose each other's keys. Separate
/// processes sharing the same entry still overwrite the whole collection,
/// last write wins.
pub struct ProgressStore<S> {
    storage: S,
    retention: Duration,
    write_lock: Mutex<()>,
}

impl<S: StoragePort> ProgressStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            retention: DEFAULT_RETENTION,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn read_all(&self) -> ProgressMap {
        self.read_all_at(now_millis())
    }

    /// Reads every record still inside the retention window as of `now`
    pub fn read_all_at(&self, now: i64) -> ProgressMap {
        let blob = match self.storage.load() {
            Ok(Some(blob)) => blob,
            Ok(None) => return ProgressMap::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read progress, using empty collection");
                return ProgressMap::new();
            }
        };

        let records: ProgressMap = match serde_json::from_str(&blob) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Stored progress is unreadable, using empty collection");
                return ProgressMap::new();
            }
        };

        let cutoff = now.saturating_sub(self.retention_millis());
        let total = records.len();
        let kept: ProgressMap = records
            .into_iter()
            .filter(|(_, record)| record.last_updated > cutoff)
            .collect();

        if kept.len() < total {
            debug!(expired = total - kept.len(), "Skipping expired progress records");
        }
        kept
    }

    /// Replaces the whole persisted collection
    pub fn write(&self, records: &ProgressMap) {
        self.save(records);
    }

    /// `false` when the write was dropped
    fn save(&self, records: &ProgressMap) -> bool {
        let blob = match serde_json::to_string(records) {
            Ok(blob) => blob,
            Err(e) => {
                error!(error = %e, "Failed to serialize progress");
                return false;
            }
        };

        match self.storage.save(&blob) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, records = records.len(), "Failed to save progress");
                false
            }
        }
    }

    pub fn update(&self, update: ProgressUpdate) -> MediaProgress {
        self.update_at(update, now_millis())
    }

    pub fn update_at(&self, update: ProgressUpdate, now: i64) -> MediaProgress {
        let _guard = self.lock();
        let mut records = self.read_all_at(now);
        let key = StoreKey::new(update.media_type, &update.id);
        let progress = WatchProgress::new(
            sanitize_seconds(update.watched, "watched"),
            sanitize_seconds(update.duration, "duration"),
        );

        let mut record = MediaProgress {
            id: update.id,
            media_type: update.media_type,
            title: update.title,
            poster_path: update.poster_path,
            backdrop_path: update.backdrop_path,
            progress,
            last_season_watched: None,
            last_episode_watched: None,
            show_progress: None,
            last_updated: now,
        };

        if record.media_type == MediaType::Tv {
            let existing = records.get(&key);
            let mut show_progress = existing
                .and_then(|r| r.show_progress.clone())
                .unwrap_or_default();

            match (update.season, update.episode) {
                (Some(season), Some(episode)) => {
                    record.last_season_watched = Some(season);
                    record.last_episode_watched = Some(episode);
                    show_progress.insert(
                        EpisodeKey::new(season, episode).to_string(),
                        EpisodeProgress {
                            season,
                            episode,
                            progress,
                            last_updated: now,
                        },
                    );
                    record.show_progress = Some(show_progress);
                }
                _ => {
                    // No episode context: keep what the show already had
                    if let Some(existing) = existing {
                        record.last_season_watched = existing.last_season_watched;
                        record.last_episode_watched = existing.last_episode_watched;
                    }
                    record.show_progress = Some(show_progress);
                }
            }
        }

        debug!(
            key = %key,
            watched = record.progress.watched,
            duration = record.progress.duration,
            "Recording progress"
        );
        records.insert(key, record.clone());
        self.write(&records);
        record
    }

    pub fn get(&self, id: &MediaId, media_type: MediaType) -> Option<MediaProgress> {
        let key = StoreKey::new(media_type, id);
        self.read_all().remove(&key)
    }

    pub fn remove(&self, id: &MediaId, media_type: MediaType) {
        let _guard = self.lock();
        let key = StoreKey::new(media_type, id);
        let mut records = self.read_all();
        if records.remove(&key).is_some() {
            debug!(key = %key, "Removed progress");
        }
        self.write(&records);
    }

    /// Rewrites the entry without expired records. Returns the number of
    /// records kept, or `None` if the rewrite was dropped.
    pub fn prune(&self) -> Option<usize> {
        let _guard = self.lock();
        let records = self.read_all();
        self.save(&records).then_some(records.len())
    }

    pub fn continue_watching(&self, limit: usize, completion_threshold: f64) -> Vec<ContinueWatchingEntry> {
        continue_watching(&self.read_all(), limit, completion_threshold)
    }

    fn retention_millis(&self) -> i64 {
        i64::try_from(self.retention.as_millis()).unwrap_or(i64::MAX)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::storage::{FileStorage, MemoryStorage};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn store() -> ProgressStore<MemoryStorage> {
        ProgressStore::new(MemoryStorage::new())
    }

    fn movie(id: &str, watched: f64, duration: f64) -> ProgressUpdate {
        ProgressUpdate::new(id, MediaType::Movie, id, watched, duration)
    }

    #[test]
    fn test_update_then_get_movie() {
        let store = store();
        let written = store.update(ProgressUpdate::new(
            "tt0111161",
            MediaType::Movie,
            "The Shawshank Redemption",
            600.0,
            8520.0,
        ));

        let record = store
            .get(&MediaId::from("tt0111161"), MediaType::Movie)
            .unwrap();
        assert_eq!(record, written);
        assert_eq!(record.progress, WatchProgress::new(600.0, 8520.0));
        assert!(record.last_season_watched.is_none());
        assert!(record.last_episode_watched.is_none());
        assert!(record.show_progress.is_none());
    }

    #[test]
    fn test_type_is_part_of_key() {
        let store = store();
        store.update(movie("42", 10.0, 100.0));
        assert!(store.get(&MediaId::from("42"), MediaType::Tv).is_none());
        assert!(store.get(&MediaId::from("42"), MediaType::Movie).is_some());
    }

    #[test]
    fn test_tv_episodes_accumulate() {
        let store = store();
        let update = |watched, episode| {
            ProgressUpdate::new("tt0944947", MediaType::Tv, "Game of Thrones", watched, 3000.0)
                .with_episode(1, episode)
        };
        store.update(update(300.0, 3));
        store.update(update(600.0, 4));

        let record = store.get(&MediaId::from("tt0944947"), MediaType::Tv).unwrap();
        let episodes = record.show_progress.as_ref().unwrap();
        assert_eq!(episodes.len(), 2);
        assert!(episodes.contains_key("s1e3"));
        assert!(episodes.contains_key("s1e4"));
        assert_eq!(episodes["s1e3"].progress.watched, 300.0);
        assert_eq!(record.last_episode(), Some((1, 4)));
        assert_eq!(record.progress, WatchProgress::new(600.0, 3000.0));
    }

    #[test]
    fn test_tv_episode_entry_overwritten_in_place() {
        let store = store();
        let base = ProgressUpdate::new("show", MediaType::Tv, "Show", 100.0, 1000.0);
        store.update(base.clone().with_episode(1, 1));
        store.update(base.clone().with_episode(1, 2));
        let mut again = base.with_episode(1, 1);
        again.watched = 900.0;
        store.update(again);

        let record = store.get(&MediaId::from("show"), MediaType::Tv).unwrap();
        let episodes = record.show_progress.unwrap();
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes["s1e1"].progress.watched, 900.0);
        assert_eq!(episodes["s1e2"].progress.watched, 100.0);
        assert_eq!(record.last_season_watched, Some(1));
        assert_eq!(record.last_episode_watched, Some(1));
    }

    #[test]
    fn test_tv_without_episode_keeps_history() {
        let store = store();
        store.update(ProgressUpdate::new("show", MediaType::Tv, "Show", 100.0, 1000.0).with_episode(2, 5));
        store.update(ProgressUpdate::new("show", MediaType::Tv, "Show", 200.0, 1000.0));

        let record = store.get(&MediaId::from("show"), MediaType::Tv).unwrap();
        assert_eq!(record.progress.watched, 200.0);
        assert_eq!(record.last_episode(), Some((2, 5)));
        assert!(record.show_progress.unwrap().contains_key("s2e5"));
    }

    #[test]
    fn test_new_show_without_episode_has_empty_history() {
        let store = store();
        let record = store.update(ProgressUpdate::new("show", MediaType::Tv, "Show", 30.0, 1000.0));
        assert_eq!(record.show_progress, Some(BTreeMap::new()));
        assert!(record.last_episode().is_none());

        let stored = store.get(&MediaId::from("show"), MediaType::Tv).unwrap();
        assert_eq!(stored.show_progress, Some(BTreeMap::new()));
    }

    #[test]
    fn test_non_finite_times_do_not_corrupt_store() {
        let store = store();
        store.update(movie("keep", 10.0, 100.0));

        let record = store.update(movie("live", 5.0, f64::NAN));
        assert_eq!(record.progress, WatchProgress::new(5.0, 0.0));
        let record = store.update(movie("broken", f64::INFINITY, f64::NEG_INFINITY));
        assert_eq!(record.progress, WatchProgress::new(0.0, 0.0));
        let record = store.update(movie("rewound", -3.0, 100.0));
        assert_eq!(record.progress.watched, 0.0);

        assert!(!store.storage().contents().unwrap().contains("\"duration\":null"));
        store.update(movie("next", 1.0, 100.0));

        let records = store.read_all();
        assert_eq!(records.len(), 5);
        let kept = store.get(&MediaId::from("keep"), MediaType::Movie).unwrap();
        assert_eq!(kept.progress, WatchProgress::new(10.0, 100.0));
    }

    #[test]
    fn test_movie_ignores_episode_context() {
        let store = store();
        let record = store.update(movie("m", 10.0, 100.0).with_episode(1, 1));
        assert!(record.show_progress.is_none());
        assert!(record.last_episode().is_none());
    }

    #[test]
    fn test_remove() {
        let store = store();
        store.update(movie("a", 10.0, 100.0));
        store.update(movie("b", 10.0, 100.0));
        store.remove(&MediaId::from("a"), MediaType::Movie);

        assert!(store.get(&MediaId::from("a"), MediaType::Movie).is_none());
        assert!(store.get(&MediaId::from("b"), MediaType::Movie).is_some());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let store = store();
        store.remove(&MediaId::from("nothing"), MediaType::Tv);
        assert!(store.read_all().is_empty());
    }

    #[test]
    fn test_retention_window() {
        let store = store();
        let now = now_millis();
        store.update_at(movie("old", 10.0, 100.0), now - 31 * DAY_MS);
        store.update_at(movie("recent", 10.0, 100.0), now - 29 * DAY_MS);

        let records = store.read_all_at(now);
        assert_eq!(records.len(), 1);
        assert!(records.contains_key(&StoreKey::new(MediaType::Movie, &MediaId::from("recent"))));
        assert!(store.get(&MediaId::from("old"), MediaType::Movie).is_none());
        assert!(store.get(&MediaId::from("recent"), MediaType::Movie).is_some());
    }

    #[test]
    fn test_custom_retention() {
        let store = store().with_retention(Duration::from_secs(60 * 60));
        let now = now_millis();
        store.update_at(movie("a", 10.0, 100.0), now - 2 * 60 * 60 * 1000);
        assert!(store.read_all_at(now).is_empty());
    }

    #[test]
    fn test_expired_pruned_lazily() {
        let store = store();
        let now = now_millis();
        store.update_at(movie("old", 10.0, 100.0), now - 40 * DAY_MS);

        // Reading filters but leaves the blob alone
        assert!(store.read_all_at(now).is_empty());
        assert!(store.storage().contents().unwrap().contains("m_old"));

        // The next write drops it
        store.update_at(movie("new", 10.0, 100.0), now);
        let blob = store.storage().contents().unwrap();
        assert!(!blob.contains("m_old"));
        assert!(blob.contains("m_new"));
    }

    #[test]
    fn test_prune_rewrites_entry() {
        let store = store();
        let now = now_millis();
        store.update_at(movie("old", 10.0, 100.0), now - 40 * DAY_MS);
        store.update(movie("new", 10.0, 100.0));

        assert_eq!(store.prune(), Some(1));
        assert!(!store.storage().contents().unwrap().contains("m_old"));
    }

    #[test]
    fn test_prune_reports_dropped_write() {
        let seeded = store();
        seeded.update(movie("a", 10.0, 100.0));
        let blob = seeded.storage().contents().unwrap();

        let store = ProgressStore::new(MemoryStorage::with_blob(blob.clone()).with_quota(8));
        assert_eq!(store.prune(), None);
        assert_eq!(store.storage().contents(), Some(blob));
    }

    #[test]
    fn test_corrupt_blob_reads_empty() {
        let store = ProgressStore::new(MemoryStorage::with_blob("{not json"));
        assert!(store.read_all().is_empty());

        // Recovers by overwriting on the next update
        store.update(movie("a", 1.0, 2.0));
        assert_eq!(store.read_all().len(), 1);
    }

    #[test]
    fn test_incompatible_blob_reads_empty() {
        let store = ProgressStore::new(MemoryStorage::with_blob(r#"{"m_a": {"id": "a"}}"#));
        assert!(store.read_all().is_empty());
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let store = ProgressStore::new(MemoryStorage::new().with_quota(8));
        let record = store.update(movie("tt0111161", 600.0, 8520.0));

        assert_eq!(record.progress.watched, 600.0);
        assert!(store.storage().contents().is_none());
        assert!(store.get(&MediaId::from("tt0111161"), MediaType::Movie).is_none());
    }

    #[test]
    fn test_file_backed_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(FileStorage::new(dir.path(), "coachflix_progress"));
        store.update(ProgressUpdate::new("1399", MediaType::Tv, "Game of Thrones", 10.0, 100.0).with_episode(1, 1));

        let reopened = ProgressStore::new(FileStorage::new(dir.path(), "coachflix_progress"));
        let record = reopened.get(&MediaId::from("1399"), MediaType::Tv).unwrap();
        assert_eq!(record.last_episode(), Some((1, 1)));
        assert!(record.episode_progress(1, 1).is_some());
    }

    #[test]
    fn test_reads_numeric_ids_from_older_blobs() {
        let now = now_millis();
        let blob = format!(
            r#"{{"m_550":{{"id":550,"type":"movie","title":"Fight Club","poster_path":null,"backdrop_path":null,"progress":{{"watched":30,"duration":8340}},"last_updated":{}}}}}"#,
            now
        );
        let store = ProgressStore::new(MemoryStorage::with_blob(blob));
        let record = store.get(&MediaId::from("550"), MediaType::Movie).unwrap();
        assert_eq!(record.title, "Fight Club");
    }
}

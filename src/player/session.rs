use tracing::{debug, info};

use crate::config::PlayerConfig;
use crate::error::Result;
use crate::metadata::{EpisodeSummary, MediaSummary, MetadataProvider, Season};
use crate::player::{PlayerMessage, embed_url};
use crate::progress::{MediaProgress, MediaType, ProgressStore, ProgressUpdate, StoragePort};

/// What is currently playing, plus the season/episode selection for shows
pub struct PlaybackSession {
    media: MediaSummary,
    season: u32,
    episode: u32,
    seasons: Vec<Season>,
    episodes: Vec<EpisodeSummary>,
}

impl PlaybackSession {
    /// Pre-selects the last watched episode of a show, or S1E1
    pub fn open<S: StoragePort>(store: &ProgressStore<S>, media: MediaSummary) -> Self {
        let (season, episode) = match media.media_type {
            MediaType::Tv => store
                .get(&media.id, MediaType::Tv)
                .and_then(|r| r.last_episode())
                .unwrap_or((1, 1)),
            MediaType::Movie => (1, 1),
        };

        Self {
            media,
            season,
            episode,
            seasons: Vec::new(),
            episodes: Vec::new(),
        }
    }

    pub fn media(&self) -> &MediaSummary {
        &self.media
    }

    pub fn season(&self) -> u32 {
        self.season
    }

    pub fn episode(&self) -> u32 {
        self.episode
    }

    pub fn seasons(&self) -> &[Season] {
        &self.seasons
    }

    pub fn episodes(&self) -> &[EpisodeSummary] {
        &self.episodes
    }

    fn is_tv(&self) -> bool {
        self.media.media_type == MediaType::Tv
    }

    pub fn select_season(&mut self, season: u32) {
        self.season = season;
        self.episode = 1;
        self.episodes.clear();
    }

    pub fn select_episode(&mut self, episode: u32) {
        self.episode = episode;
    }

    /// Fetches the season list and the selected season's episodes
    pub async fn load<P: MetadataProvider + ?Sized>(&mut self, provider: &P) -> Result<()> {
        if !self.is_tv() {
            return Ok(());
        }
        self.seasons = provider.seasons(&self.media.id).await?;
        self.episodes = provider.season_episodes(&self.media.id, self.season).await?;
        debug!(
            seasons = self.seasons.len(),
            episodes = self.episodes.len(),
            "Loaded show listing"
        );
        Ok(())
    }

    pub async fn change_season<P: MetadataProvider + ?Sized>(&mut self, provider: &P, season: u32) -> Result<()> {
        self.select_season(season);
        self.episodes = provider.season_episodes(&self.media.id, season).await?;
        Ok(())
    }

    pub fn embed_url(&self, config: &PlayerConfig) -> String {
        embed_url(config, &self.media, self.season, self.episode)
    }

    /// Seconds to resume from for the current selection
    pub fn resume_position<S: StoragePort>(&self, store: &ProgressStore<S>) -> f64 {
        let Some(record) = store.get(&self.media.id, self.media.media_type) else {
            return 0.0;
        };
        match self.media.media_type {
            MediaType::Movie => record.progress.watched,
            MediaType::Tv => record
                .episode_progress(self.season, self.episode)
                .map(|e| e.progress.watched)
                .unwrap_or(0.0),
        }
    }

    /// Records a progress message against the current selection
    pub fn on_message<S: StoragePort>(
        &self,
        store: &ProgressStore<S>,
        message: &PlayerMessage,
    ) -> Option<MediaProgress> {
        let PlayerMessage::Progress { watched, duration } = *message else {
            return None;
        };

        let mut update = ProgressUpdate::new(
            self.media.id.clone(),
            self.media.media_type,
            self.media.title.clone(),
            watched,
            duration,
        )
        .with_images(self.media.poster_path.clone(), self.media.backdrop_path.clone());

        if self.is_tv() {
            update = update.with_episode(self.season, self.episode);
        }

        Some(store.update(update))
    }

    /// Moves to the following episode, rolling over into the next season
    pub async fn next_episode<P: MetadataProvider + ?Sized>(&mut self, provider: &P) -> Result<Option<(u32, u32)>> {
        if !self.is_tv() {
            return Ok(None);
        }

        let next_in_season = self
            .episodes
            .iter()
            .map(|e| e.episode_number)
            .filter(|&n| n > self.episode)
            .min();
        if let Some(episode) = next_in_season {
            self.episode = episode;
            return Ok(Some((self.season, self.episode)));
        }

        let next_season = self
            .seasons
            .iter()
            .map(|s| s.season_number)
            .filter(|&n| n > self.season)
            .min();
        let Some(season) = next_season else {
            return Ok(None);
        };

        self.change_season(provider, season).await?;
        if let Some(first) = self.episodes.iter().map(|e| e.episode_number).min() {
            self.episode = first;
        }
        info!(season = self.season, episode = self.episode, "Advanced to next season");
        Ok(Some((self.season, self.episode)))
    }

    /// Moves to the preceding episode. Crossing back into the previous
    /// season waits for that season's listing and lands on its last episode.
    pub async fn previous_episode<P: MetadataProvider + ?Sized>(&mut self, provider: &P) -> Result<Option<(u32, u32)>> {
        if !self.is_tv() {
            return Ok(None);
        }

        let previous_in_season = if self.episodes.is_empty() {
            (self.episode > 1).then(|| self.episode - 1)
        } else {
            self.episodes
                .iter()
                .map(|e| e.episode_number)
                .filter(|&n| n < self.episode)
                .max()
        };
        if let Some(episode) = previous_in_season {
            self.episode = episode;
            return Ok(Some((self.season, self.episode)));
        }

        let previous_season = if self.seasons.is_empty() {
            (self.season > 1).then(|| self.season - 1)
        } else {
            self.seasons
                .iter()
                .map(|s| s.season_number)
                .filter(|&n| n < self.season)
                .max()
        };
        let Some(season) = previous_season else {
            return Ok(None);
        };

        self.change_season(provider, season).await?;
        self.episode = self
            .episodes
            .iter()
            .map(|e| e.episode_number)
            .max()
            .unwrap_or(1);
        Ok(Some((self.season, self.episode)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Category;
    use crate::progress::{MediaId, MemoryStorage, WatchProgress};

    /// Two seasons: three episodes, then two
    struct FakeProvider;

    #[async_trait::async_trait]
    impl MetadataProvider for FakeProvider {
        async fn by_category(&self, _category: Category) -> Result<Vec<MediaSummary>> {
            Ok(Vec::new())
        }

        async fn search(&self, _query: &str) -> Result<Vec<MediaSummary>> {
            Ok(Vec::new())
        }

        async fn seasons(&self, _show_id: &MediaId) -> Result<Vec<Season>> {
            Ok((1..=2)
                .map(|n| Season {
                    season_number: n,
                    episode_count: None,
                    name: format!("Season {}", n),
                })
                .collect())
        }

        async fn season_episodes(&self, _show_id: &MediaId, season: u32) -> Result<Vec<EpisodeSummary>> {
            let count = if season == 1 { 3 } else { 2 };
            Ok((1..=count)
                .map(|n| EpisodeSummary {
                    id: format!("s{}e{}", season, n),
                    name: format!("Episode {}", n),
                    episode_number: n,
                    season_number: season,
                    overview: String::new(),
                    still_path: None,
                })
                .collect())
        }
    }

    fn summary(id: &str, media_type: MediaType) -> MediaSummary {
        MediaSummary {
            id: MediaId::from(id),
            title: "Game of Thrones".to_string(),
            poster_path: Some("poster.jpg".to_string()),
            backdrop_path: None,
            overview: String::new(),
            release_date: None,
            vote_average: 9.2,
            media_type,
        }
    }

    fn progress(watched: f64, duration: f64) -> PlayerMessage {
        PlayerMessage::Progress { watched, duration }
    }

    #[test]
    fn test_open_defaults_to_first_episode() {
        let store = ProgressStore::new(MemoryStorage::new());
        let session = PlaybackSession::open(&store, summary("got", MediaType::Tv));
        assert_eq!((session.season(), session.episode()), (1, 1));
    }

    #[test]
    fn test_open_resumes_last_episode() {
        let store = ProgressStore::new(MemoryStorage::new());
        store.update(ProgressUpdate::new("got", MediaType::Tv, "Game of Thrones", 300.0, 3000.0).with_episode(2, 4));

        let session = PlaybackSession::open(&store, summary("got", MediaType::Tv));
        assert_eq!((session.season(), session.episode()), (2, 4));
        assert_eq!(session.resume_position(&store), 300.0);
    }

    #[test]
    fn test_messages_record_progress() {
        let store = ProgressStore::new(MemoryStorage::new());
        let mut session = PlaybackSession::open(&store, summary("got", MediaType::Tv));

        session.select_episode(3);
        session.on_message(&store, &progress(300.0, 3000.0)).unwrap();
        session.select_episode(4);
        let record = session.on_message(&store, &progress(600.0, 3000.0)).unwrap();

        assert_eq!(record.last_episode(), Some((1, 4)));
        assert_eq!(record.poster_path.as_deref(), Some("poster.jpg"));
        let episodes = record.show_progress.unwrap();
        assert!(episodes.contains_key("s1e3"));
        assert!(episodes.contains_key("s1e4"));
        assert!(session.on_message(&store, &PlayerMessage::Other).is_none());
    }

    #[test]
    fn test_movie_resume_position() {
        let store = ProgressStore::new(MemoryStorage::new());
        let session = PlaybackSession::open(&store, summary("tt0111161", MediaType::Movie));
        assert_eq!(session.resume_position(&store), 0.0);

        let record = session.on_message(&store, &progress(600.0, 8520.0)).unwrap();
        assert_eq!(record.progress, WatchProgress::new(600.0, 8520.0));
        assert!(record.show_progress.is_none());
        assert_eq!(session.resume_position(&store), 600.0);
    }

    #[test]
    fn test_select_season_resets_episode() {
        let store = ProgressStore::new(MemoryStorage::new());
        let mut session = PlaybackSession::open(&store, summary("got", MediaType::Tv));
        session.select_episode(7);
        session.select_season(3);
        assert_eq!((session.season(), session.episode()), (3, 1));
    }

    #[tokio::test]
    async fn test_next_episode_rolls_into_next_season() {
        let store = ProgressStore::new(MemoryStorage::new());
        let mut session = PlaybackSession::open(&store, summary("got", MediaType::Tv));
        session.load(&FakeProvider).await.unwrap();
        assert_eq!(session.episodes().len(), 3);

        assert_eq!(session.next_episode(&FakeProvider).await.unwrap(), Some((1, 2)));
        assert_eq!(session.next_episode(&FakeProvider).await.unwrap(), Some((1, 3)));
        assert_eq!(session.next_episode(&FakeProvider).await.unwrap(), Some((2, 1)));
        assert_eq!(session.episodes().len(), 2);
        assert_eq!(session.next_episode(&FakeProvider).await.unwrap(), Some((2, 2)));
        assert_eq!(session.next_episode(&FakeProvider).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_previous_episode_lands_on_last_of_previous_season() {
        let store = ProgressStore::new(MemoryStorage::new());
        store.update(ProgressUpdate::new("got", MediaType::Tv, "Game of Thrones", 10.0, 3000.0).with_episode(2, 1));

        let mut session = PlaybackSession::open(&store, summary("got", MediaType::Tv));
        session.load(&FakeProvider).await.unwrap();

        assert_eq!(session.previous_episode(&FakeProvider).await.unwrap(), Some((1, 3)));
        assert_eq!(session.episodes().len(), 3);
        assert_eq!(session.previous_episode(&FakeProvider).await.unwrap(), Some((1, 2)));
        assert_eq!(session.previous_episode(&FakeProvider).await.unwrap(), Some((1, 1)));
        assert_eq!(session.previous_episode(&FakeProvider).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_movies_have_no_episodes() {
        let store = ProgressStore::new(MemoryStorage::new());
        let mut session = PlaybackSession::open(&store, summary("m", MediaType::Movie));
        session.load(&FakeProvider).await.unwrap();
        assert!(session.seasons().is_empty());
        assert_eq!(session.next_episode(&FakeProvider).await.unwrap(), None);
        assert_eq!(session.previous_episode(&FakeProvider).await.unwrap(), None);
    }
}

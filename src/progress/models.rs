use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::progress::keys::{EpisodeKey, StoreKey};

/// Every persisted record, keyed by store key
pub type ProgressMap = BTreeMap<StoreKey, MediaProgress>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    /// Single-character discriminator used in store keys
    pub fn tag(&self) -> char {
        match self {
            MediaType::Movie => 'm',
            MediaType::Tv => 't',
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "m" => Some(MediaType::Movie),
            "t" => Some(MediaType::Tv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "movie" | "m" => Ok(MediaType::Movie),
            "tv" | "t" => Ok(MediaType::Tv),
            other => Err(Error::InvalidInput(format!(
                "unknown media type '{}' (expected movie or tv)",
                other
            ))),
        }
    }
}

/// Opaque media identifier. Older blobs stored numeric ids, so both JSON
/// strings and numbers are accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawMediaId")]
pub struct MediaId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMediaId {
    Text(String),
    Number(i64),
}

impl From<RawMediaId> for MediaId {
    fn from(raw: RawMediaId) -> Self {
        match raw {
            RawMediaId::Text(s) => MediaId(s),
            RawMediaId::Number(n) => MediaId(n.to_string()),
        }
    }
}

impl MediaId {
    pub fn new(id: impl Into<String>) -> Self {
        MediaId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for MediaId {
    fn from(s: &str) -> Self {
        MediaId(s.to_string())
    }
}

impl From<String> for MediaId {
    fn from(s: String) -> Self {
        MediaId(s)
    }
}

/// Elapsed vs. total playback time, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WatchProgress {
    pub watched: f64,
    pub duration: f64,
}

impl WatchProgress {
    pub fn new(watched: f64, duration: f64) -> Self {
        Self { watched, duration }
    }

    /// Completion percentage in [0, 100]; 0 when the duration is unknown
    pub fn percent(&self) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (self.watched / self.duration * 100.0).clamp(0.0, 100.0)
    }

    /// Started but not materially finished
    pub fn is_in_progress(&self, completion_threshold: f64) -> bool {
        self.watched > 0.0 && self.watched < self.duration * completion_threshold
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeProgress {
    pub season: u32,
    pub episode: u32,
    pub progress: WatchProgress,
    /// Epoch milliseconds
    pub last_updated: i64,
}

/// Persisted progress for one movie or show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaProgress {
    pub id: MediaId,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    /// Progress of the most recently watched unit (movie or episode)
    pub progress: WatchProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_season_watched: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_episode_watched: Option<u32>,
    /// Per-episode history keyed by `s{season}e{episode}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_progress: Option<BTreeMap<String, EpisodeProgress>>,
    /// Epoch milliseconds
    pub last_updated: i64,
}

impl MediaProgress {
    pub fn key(&self) -> StoreKey {
        StoreKey::new(self.media_type, &self.id)
    }

    pub fn last_episode(&self) -> Option<(u32, u32)> {
        match (self.last_season_watched, self.last_episode_watched) {
            (Some(season), Some(episode)) => Some((season, episode)),
            _ => None,
        }
    }

    pub fn episode_progress(&self, season: u32, episode: u32) -> Option<&EpisodeProgress> {
        let key = EpisodeKey::new(season, episode).to_string();
        self.show_progress.as_ref()?.get(&key)
    }
}

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::progress::models::{MediaId, MediaType};

static EPISODE_KEY_PATTERN: OnceLock<Regex> = OnceLock::new();

fn episode_key_pattern() -> &'static Regex {
    EPISODE_KEY_PATTERN.get_or_init(|| Regex::new(r"^s(\d+)e(\d+)$").unwrap())
}

/// `m_{id}` / `t_{id}`, one per (type, id) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreKey(String);

impl StoreKey {
    pub fn new(media_type: MediaType, id: &MediaId) -> Self {
        StoreKey(format!("{}_{}", media_type.tag(), id))
    }

    pub fn parse(key: &str) -> Option<(MediaType, MediaId)> {
        let (tag, id) = key.split_once('_')?;
        let media_type = MediaType::from_tag(tag)?;
        Some((media_type, MediaId::new(id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `s{season}e{episode}` inside a show's episode history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EpisodeKey {
    pub season: u32,
    pub episode: u32,
}

impl EpisodeKey {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }

    pub fn parse(key: &str) -> Option<Self> {
        let caps = episode_key_pattern().captures(key)?;
        let season = caps.get(1)?.as_str().parse().ok()?;
        let episode = caps.get(2)?.as_str().parse().ok()?;
        Some(Self { season, episode })
    }
}

impl fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}e{}", self.season, self.episode)
    }
}

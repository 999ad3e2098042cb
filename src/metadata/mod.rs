use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::progress::{MediaId, MediaProgress, MediaType};

pub mod imdb;

/// A title as listed in a category row or search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub id: MediaId,
    pub title: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub overview: String,
    pub release_date: Option<String>,
    pub vote_average: f64,
    pub media_type: MediaType,
}

impl MediaSummary {
    pub fn release_year(&self) -> Option<&str> {
        self.release_date.as_deref().and_then(|d| d.get(..4))
    }
}

/// Rebuilds enough of a summary from a stored record to reopen the player
impl From<&MediaProgress> for MediaSummary {
    fn from(record: &MediaProgress) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            poster_path: record.poster_path.clone(),
            backdrop_path: record.backdrop_path.clone(),
            overview: String::new(),
            release_date: None,
            vote_average: 0.0,
            media_type: record.media_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub season_number: u32,
    pub episode_count: Option<u32>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub id: String,
    pub name: String,
    pub episode_number: u32,
    pub season_number: u32,
    pub overview: String,
    pub still_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Trending,
    Popular,
    TopRated,
    Upcoming,
    TrendingTv,
    PopularTv,
    TopRatedTv,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Trending,
        Category::Popular,
        Category::TopRated,
        Category::Upcoming,
        Category::TrendingTv,
        Category::PopularTv,
        Category::TopRatedTv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Trending => "trending",
            Category::Popular => "popular",
            Category::TopRated => "top_rated",
            Category::Upcoming => "upcoming",
            Category::TrendingTv => "trending_tv",
            Category::PopularTv => "popular_tv",
            Category::TopRatedTv => "top_rated_tv",
        }
    }

    pub fn as_display(&self) -> &'static str {
        match self {
            Category::Trending => "Trending Now",
            Category::Popular => "Popular Movies",
            Category::TopRated => "Top Rated",
            Category::Upcoming => "Coming Soon",
            Category::TrendingTv => "Trending TV Shows",
            Category::PopularTv => "Popular TV Shows",
            Category::TopRatedTv => "Top Rated TV Shows",
        }
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            Category::Trending | Category::Popular | Category::TopRated | Category::Upcoming => {
                MediaType::Movie
            }
            Category::TrendingTv | Category::PopularTv | Category::TopRatedTv => MediaType::Tv,
        }
    }

    /// Provider sort key; every category sorts descending
    pub fn sort_by(&self) -> &'static str {
        match self {
            Category::Trending | Category::Popular | Category::TrendingTv | Category::PopularTv => {
                "SORT_BY_POPULARITY"
            }
            Category::TopRated | Category::TopRatedTv => "SORT_BY_USER_RATING",
            Category::Upcoming => "SORT_BY_RELEASE_DATE",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown category '{}'", s)))
    }
}

#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn by_category(&self, category: Category) -> Result<Vec<MediaSummary>>;
    async fn search(&self, query: &str) -> Result<Vec<MediaSummary>>;
    async fn seasons(&self, show_id: &MediaId) -> Result<Vec<Season>>;
    async fn season_episodes(&self, show_id: &MediaId, season: u32) -> Result<Vec<EpisodeSummary>>;
}

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::MetadataConfig;
use crate::error::{Error, Result};
use crate::metadata::{Category, EpisodeSummary, MediaSummary, MetadataProvider, Season};
use crate::progress::{MediaId, MediaType};

pub struct ImdbClient {
    client: Client,
    base_url: String,
    min_vote_count: u32,
    page_size: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImdbImage {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImdbRating {
    #[serde(default)]
    aggregate_rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImdbTitle {
    id: String,
    #[serde(rename = "type", default)]
    title_type: String,
    primary_title: String,
    #[serde(default)]
    primary_image: Option<ImdbImage>,
    #[serde(default)]
    plot: Option<String>,
    #[serde(default)]
    start_year: Option<u32>,
    #[serde(default)]
    rating: Option<ImdbRating>,
}

#[derive(Debug, Deserialize)]
struct TitlesResponse {
    #[serde(default)]
    titles: Vec<ImdbTitle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImdbSeason {
    season: String,
    #[serde(default)]
    episode_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SeasonsResponse {
    #[serde(default)]
    seasons: Vec<ImdbSeason>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImdbEpisode {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    season: String,
    #[serde(default)]
    episode_number: Option<u32>,
    #[serde(default)]
    plot: Option<String>,
    #[serde(default)]
    primary_image: Option<ImdbImage>,
}

#[derive(Debug, Deserialize)]
struct EpisodesResponse {
    #[serde(default)]
    episodes: Vec<ImdbEpisode>,
}

impl ImdbClient {
    pub fn new(config: &MetadataConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            min_vote_count: config.min_vote_count,
            page_size: config.page_size,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(url = %url, "Fetching from IMDb API");

        let response = self.client.get(&url).query(params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Metadata(format!("{} returned {}", endpoint, status)));
        }

        Ok(response.json().await?)
    }
}

fn map_title(title: ImdbTitle) -> MediaSummary {
    let media_type = match title.title_type.as_str() {
        "tvSeries" | "tvMiniSeries" => MediaType::Tv,
        _ => MediaType::Movie,
    };
    let image = title.primary_image.map(|i| i.url);

    MediaSummary {
        id: MediaId::new(title.id),
        title: title.primary_title,
        poster_path: image.clone(),
        backdrop_path: image,
        overview: title.plot.unwrap_or_default(),
        release_date: title.start_year.map(|y| format!("{}-01-01", y)),
        vote_average: title.rating.and_then(|r| r.aggregate_rating).unwrap_or(0.0),
        media_type,
    }
}

fn map_seasons(seasons: Vec<ImdbSeason>) -> Vec<Season> {
    seasons
        .into_iter()
        .filter_map(|s| {
            let season_number: u32 = s.season.trim().parse().ok()?;
            Some(Season {
                season_number,
                episode_count: s.episode_count,
                name: format!("Season {}", season_number),
            })
        })
        // Season 0 holds specials
        .filter(|s| s.season_number > 0)
        .collect()
}

fn map_episode(episode: ImdbEpisode, requested_season: u32) -> Option<EpisodeSummary> {
    let episode_number = episode.episode_number?;
    let season_number = episode.season.trim().parse().unwrap_or(requested_season);

    Some(EpisodeSummary {
        id: episode.id,
        name: episode.title,
        episode_number,
        season_number,
        overview: episode.plot.unwrap_or_default(),
        still_path: episode.primary_image.map(|i| i.url),
    })
}

#[async_trait::async_trait]
impl MetadataProvider for ImdbClient {
    async fn by_category(&self, category: Category) -> Result<Vec<MediaSummary>> {
        let title_type = match category.media_type() {
            MediaType::Movie => "MOVIE",
            MediaType::Tv => "TV_SERIES",
        };
        let params = [
            ("types", title_type.to_string()),
            ("sortBy", category.sort_by().to_string()),
            ("sortOrder", "DESC".to_string()),
            ("minVoteCount", self.min_vote_count.to_string()),
        ];

        let data: TitlesResponse = self.fetch("/titles", &params).await?;
        Ok(data
            .titles
            .into_iter()
            .take(self.page_size)
            .map(map_title)
            .collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<MediaSummary>> {
        let params = [
            ("query", query.to_string()),
            ("limit", self.page_size.to_string()),
        ];
        let data: TitlesResponse = self.fetch("/search/titles", &params).await?;
        Ok(data.titles.into_iter().map(map_title).collect())
    }

    async fn seasons(&self, show_id: &MediaId) -> Result<Vec<Season>> {
        let endpoint = format!("/titles/{}/seasons", urlencoding::encode(show_id.as_str()));
        let data: SeasonsResponse = self.fetch(&endpoint, &[]).await?;
        Ok(map_seasons(data.seasons))
    }

    async fn season_episodes(&self, show_id: &MediaId, season: u32) -> Result<Vec<EpisodeSummary>> {
        let endpoint = format!("/titles/{}/episodes", urlencoding::encode(show_id.as_str()));
        let data: EpisodesResponse = self
            .fetch(&endpoint, &[("season", season.to_string())])
            .await?;
        Ok(data
            .episodes
            .into_iter()
            .filter_map(|e| map_episode(e, season))
            .collect())
    }
}

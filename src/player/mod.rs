pub mod session;

use serde::Deserialize;
use tracing::debug;

pub use session::PlaybackSession;

use crate::config::PlayerConfig;
use crate::metadata::MediaSummary;
use crate::progress::MediaType;

/// Message posted by the embedded player
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlayerMessage {
    Progress { watched: f64, duration: f64 },
    #[serde(other)]
    Other,
}

impl PlayerMessage {
    /// Malformed messages are dropped
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(msg) => Some(msg),
            Err(e) => {
                debug!("Ignoring malformed player message: {}", e);
                None
            }
        }
    }
}

pub fn embed_url(config: &PlayerConfig, media: &MediaSummary, season: u32, episode: u32) -> String {
    let base = config.embed_base_url.trim_end_matches('/');
    let id = urlencoding::encode(media.id.as_str());

    match media.media_type {
        MediaType::Movie => format!("{}/movie/{}", base, id),
        MediaType::Tv => {
            let mut url = format!("{}/tv/{}/{}/{}", base, id, season, episode);
            if config.autoplay {
                url.push_str("?autoPlay=true");
            }
            url
        }
    }
}

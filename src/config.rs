use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub continue_watching: ContinueWatchingConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Name of the single storage entry holding every progress record
    #[serde(default = "default_entry_name")]
    pub entry_name: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    /// Overrides the directory the entry lives in (defaults to the data dir)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinueWatchingConfig {
    #[serde(default = "default_continue_limit")]
    pub limit: usize,
    #[serde(default = "default_completion_threshold")]
    pub completion_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_metadata_base_url")]
    pub base_url: String,
    #[serde(default = "default_min_vote_count")]
    pub min_vote_count: u32,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_embed_base_url")]
    pub embed_base_url: String,
    #[serde(default = "default_true")]
    pub autoplay: bool,
}

fn default_entry_name() -> String {
    "coachflix_progress".to_string()
}

fn default_retention_days() -> u64 {
    30
}

fn default_continue_limit() -> usize {
    10
}

fn default_completion_threshold() -> f64 {
    0.95
}

fn default_metadata_base_url() -> String {
    "https://api.imdbapi.dev".to_string()
}

fn default_min_vote_count() -> u32 {
    1000
}

fn default_page_size() -> usize {
    20
}

fn default_embed_base_url() -> String {
    "https://vidfast.pro".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            entry_name: default_entry_name(),
            retention_days: default_retention_days(),
            dir: None,
        }
    }
}

impl Default for ContinueWatchingConfig {
    fn default() -> Self {
        Self {
            limit: default_continue_limit(),
            completion_threshold: default_completion_threshold(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_url: default_metadata_base_url(),
            min_vote_count: default_min_vote_count(),
            page_size: default_page_size(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            embed_base_url: default_embed_base_url(),
            autoplay: true,
        }
    }
}

impl StorageConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 60 * 60)
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "coachflix").ok_or(Error::NoConfigDir)
}

pub fn config_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().to_path_buf())
}

pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = config_path()?;

        if !path.exists() {
            let config = Config::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Directory holding the progress entry
    pub fn progress_dir(&self) -> Result<PathBuf> {
        match &self.storage.dir {
            Some(dir) => Ok(expand_home(dir)),
            None => data_dir(),
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    dirs_home()
        .map(|home| home.join(rest))
        .unwrap_or_else(|| path.to_path_buf())
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

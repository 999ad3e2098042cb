pub mod config;
pub mod error;
pub mod metadata;
pub mod player;
pub mod progress;

pub use config::Config;
pub use error::{Error, Result};
pub use progress::{MediaProgress, ProgressStore, ProgressUpdate, StoragePort};

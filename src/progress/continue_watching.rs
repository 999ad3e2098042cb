use crate::progress::models::{MediaProgress, MediaType, ProgressMap};

/// A started-but-unfinished title for the "continue watching" row
#[derive(Debug, Clone, PartialEq)]
pub struct ContinueWatchingEntry {
    pub record: MediaProgress,
}

impl ContinueWatchingEntry {
    pub fn percent(&self) -> f64 {
        self.record.progress.percent()
    }

    pub fn percent_label(&self) -> String {
        format!("{}% complete", self.percent().round() as u32)
    }

    /// `S{season} E{episode}` for shows with a last watched episode
    pub fn episode_label(&self) -> Option<String> {
        if self.record.media_type != MediaType::Tv {
            return None;
        }
        self.record
            .last_episode()
            .map(|(season, episode)| format!("S{} E{}", season, episode))
    }

    pub fn watched_label(&self) -> String {
        format!("{} watched", format_watch_time(self.record.progress.watched))
    }
}

/// Records with `0 < watched < threshold * duration`, most recent first
pub fn continue_watching(
    records: &ProgressMap,
    limit: usize,
    completion_threshold: f64,
) -> Vec<ContinueWatchingEntry> {
    let mut started: Vec<&MediaProgress> = records
        .values()
        .filter(|r| r.progress.is_in_progress(completion_threshold))
        .collect();

    started.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));

    started
        .into_iter()
        .take(limit)
        .map(|record| ContinueWatchingEntry {
            record: record.clone(),
        })
        .collect()
}

/// `1h 5m` or `42m`
pub fn format_watch_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

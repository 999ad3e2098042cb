use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use coachflix::config::Config;
use coachflix::error::Result;
use coachflix::metadata::imdb::ImdbClient;
use coachflix::metadata::{Category, MediaSummary, MetadataProvider};
use coachflix::player::{PlaybackSession, PlayerMessage};
use coachflix::progress::{
    self, EpisodeKey, FileStorage, MediaId, MediaProgress, MediaType, ProgressStore,
    ProgressUpdate, StoreKey, format_watch_time,
};

use crate::cli::{Cli, Command};

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let store = progress::open(&config)?;
    let provider = ImdbClient::new(&config.metadata);

    match cli.command {
        Some(Command::Browse { category }) => run_browse(&provider, category).await?,
        Some(Command::Search { query }) => run_search(&provider, &query).await?,
        Some(Command::Seasons { id }) => run_seasons(&provider, &MediaId::from(id)).await?,
        Some(Command::Continue) | None => run_continue(&store, &config),
        Some(Command::List) => run_list(&store),
        Some(Command::Show { media_type, id }) => run_show(&store, media_type, &MediaId::from(id)),
        Some(Command::Record {
            media_type,
            id,
            title,
            watched,
            duration,
            season,
            episode,
            poster,
            backdrop,
        }) => {
            let mut update = ProgressUpdate::new(id, media_type, title, watched, duration)
                .with_images(poster, backdrop);
            update.season = season;
            update.episode = episode;
            let record = store.update(update);
            println!("Recorded {}", describe(&record));
        }
        Some(Command::Remove { media_type, id }) => {
            store.remove(&MediaId::from(id), media_type);
            println!("Removed");
        }
        Some(Command::Play {
            media_type,
            id,
            title,
            season,
            episode,
            next,
            previous,
        }) => {
            let media = media_for(&store, media_type, id, title);
            let mut session = PlaybackSession::open(&store, media);
            select(&mut session, season, episode);

            if next || previous {
                session.load(&provider).await?;
                let moved = if next {
                    session.next_episode(&provider).await?
                } else {
                    session.previous_episode(&provider).await?
                };
                if moved.is_none() {
                    println!("No episode to move to");
                }
            }

            if media_type == MediaType::Tv {
                println!("S{} E{}", session.season(), session.episode());
            }
            println!("{}", session.embed_url(&config.player));
            println!(
                "Resume at {}",
                format_watch_time(session.resume_position(&store))
            );
        }
        Some(Command::Watch {
            media_type,
            id,
            title,
            season,
            episode,
        }) => {
            let media = media_for(&store, media_type, id, Some(title));
            let mut session = PlaybackSession::open(&store, media);
            select(&mut session, season, episode);
            run_watch(&store, &session).await?;
        }
        Some(Command::Prune) => {
            match store.prune() {
                Some(kept) => println!("{} records kept", kept),
                None => println!("Could not rewrite progress; see log"),
            }
        }
    }

    Ok(())
}

async fn run_browse(provider: &dyn MetadataProvider, category: Option<Category>) -> Result<()> {
    let categories = match category {
        Some(category) => vec![category],
        None => Category::ALL.to_vec(),
    };

    for category in categories {
        println!("== {}", category.as_display());
        match provider.by_category(category).await {
            Ok(items) => print_summaries(&items),
            Err(e) => {
                // One failing row should not hide the others
                warn!(category = %category, error = %e, "Failed to load category");
                println!("  (unavailable)");
            }
        }
        println!();
    }
    Ok(())
}

async fn run_search(provider: &dyn MetadataProvider, query: &str) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(());
    }
    let items = provider.search(query).await?;
    info!(query, results = items.len(), "Search finished");
    print_summaries(&items);
    Ok(())
}

async fn run_seasons(provider: &dyn MetadataProvider, id: &MediaId) -> Result<()> {
    for season in provider.seasons(id).await? {
        println!("{}", season.name);
        for episode in provider.season_episodes(id, season.season_number).await? {
            println!("  {}. {}", episode.episode_number, episode.name);
        }
    }
    Ok(())
}

fn run_continue(store: &ProgressStore<FileStorage>, config: &Config) {
    let entries = store.continue_watching(
        config.continue_watching.limit,
        config.continue_watching.completion_threshold,
    );
    if entries.is_empty() {
        println!("Nothing in progress");
        return;
    }

    for entry in entries {
        let episode = entry
            .episode_label()
            .map(|label| format!(" {}", label))
            .unwrap_or_default();
        println!(
            "{}{}  {}  {}  [{} {}]",
            entry.record.title,
            episode,
            entry.watched_label(),
            entry.percent_label(),
            entry.record.media_type,
            entry.record.id
        );
    }
}

fn run_list(store: &ProgressStore<FileStorage>) {
    for (key, record) in store.read_all() {
        let Some((media_type, id)) = StoreKey::parse(key.as_str()) else {
            warn!(key = %key, "Skipping record with unrecognised key");
            continue;
        };
        println!("{:<4} {:<12} {}", media_type, id, record.title);
    }
}

fn run_show(store: &ProgressStore<FileStorage>, media_type: MediaType, id: &MediaId) {
    let Some(record) = store.get(id, media_type) else {
        println!("No progress stored");
        return;
    };

    println!("{}", describe(&record));
    if let Some(history) = &record.show_progress {
        let mut episodes: Vec<(EpisodeKey, f64)> = history
            .iter()
            .filter_map(|(key, entry)| Some((EpisodeKey::parse(key)?, entry.progress.percent())))
            .collect();
        episodes.sort_by_key(|(key, _)| (key.season, key.episode));
        for (key, percent) in episodes {
            println!("  {}  {:.0}%", key, percent);
        }
    }
}

async fn run_watch(store: &ProgressStore<FileStorage>, session: &PlaybackSession) -> Result<()> {
    info!(id = %session.media().id, "Listening for player messages");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let Some(message) = PlayerMessage::parse(&line) else {
            continue;
        };
        if let Some(record) = session.on_message(store, &message) {
            println!("{}", describe(&record));
        }
    }
    Ok(())
}

/// Prefers the stored snapshot so images survive without a metadata lookup
fn media_for(
    store: &ProgressStore<FileStorage>,
    media_type: MediaType,
    id: String,
    title: Option<String>,
) -> MediaSummary {
    let id = MediaId::from(id);
    match store.get(&id, media_type) {
        Some(record) => {
            let mut media = MediaSummary::from(&record);
            if let Some(title) = title {
                media.title = title;
            }
            media
        }
        None => MediaSummary {
            title: title.unwrap_or_else(|| id.to_string()),
            id,
            poster_path: None,
            backdrop_path: None,
            overview: String::new(),
            release_date: None,
            vote_average: 0.0,
            media_type,
        },
    }
}

fn select(session: &mut PlaybackSession, season: Option<u32>, episode: Option<u32>) {
    if let Some(season) = season {
        session.select_season(season);
    }
    if let Some(episode) = episode {
        session.select_episode(episode);
    }
}

fn describe(record: &MediaProgress) -> String {
    let episode = record
        .last_episode()
        .map(|(s, e)| format!(" S{} E{}", s, e))
        .unwrap_or_default();
    format!(
        "{}{}: {} / {} ({:.0}%)",
        record.title,
        episode,
        format_watch_time(record.progress.watched),
        format_watch_time(record.progress.duration),
        record.progress.percent()
    )
}

fn print_summaries(items: &[MediaSummary]) {
    for item in items {
        let year = item
            .release_year()
            .map(|y| format!(" ({})", y))
            .unwrap_or_default();
        println!(
            "  {:<12} {:<5} {:>4.1}  {}{}",
            item.id, item.media_type, item.vote_average, item.title, year
        );
    }
}

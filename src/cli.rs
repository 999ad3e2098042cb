use clap::{Parser, Subcommand};

use coachflix::metadata::Category;
use coachflix::progress::MediaType;

#[derive(Debug, Parser)]
#[command(
    name = "coachflix",
    version,
    about = "Browse movies and shows, and keep track of where you left off"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List one category, or every category
    Browse { category: Option<Category> },
    /// Search titles
    Search { query: String },
    /// List a show's seasons and episodes
    Seasons { id: String },
    /// Titles started but not finished
    Continue,
    /// Every stored progress record
    List,
    /// Print the stored progress for one title
    Show { media_type: MediaType, id: String },
    /// Record a progress update
    Record {
        media_type: MediaType,
        id: String,
        title: String,
        watched: f64,
        duration: f64,
        #[arg(long)]
        season: Option<u32>,
        #[arg(long)]
        episode: Option<u32>,
        #[arg(long)]
        poster: Option<String>,
        #[arg(long)]
        backdrop: Option<String>,
    },
    /// Delete the stored progress for one title
    Remove { media_type: MediaType, id: String },
    /// Print the player URL and resume position
    Play {
        media_type: MediaType,
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        season: Option<u32>,
        #[arg(long)]
        episode: Option<u32>,
        #[arg(long, conflicts_with = "previous")]
        next: bool,
        #[arg(long)]
        previous: bool,
    },
    /// Record player messages read line by line from stdin
    Watch {
        media_type: MediaType,
        id: String,
        title: String,
        #[arg(long)]
        season: Option<u32>,
        #[arg(long)]
        episode: Option<u32>,
    },
    /// Drop expired records from storage
    Prune,
}

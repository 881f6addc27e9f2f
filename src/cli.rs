use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Music search and audio stream proxy
#[derive(Parser)]
#[command(name = "oblivion")]
#[command(about = "Serve or query the music search and stream proxy", long_about = None)]
pub struct Cli {
    /// Path to a TOML config file (defaults to the per-user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Override the bind address (e.g. 0.0.0.0:8080)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },
    /// Search for music
    Search {
        /// Query to search for
        query: String,
        /// Query the Invidious mirrors instead of scraping the results page
        #[arg(long)]
        invidious: bool,
    },
    /// List audio streams for a video id
    Streams {
        video_id: String,
    },
    /// Run the results-page extractor over a saved HTML file
    Scrape {
        file: PathBuf,
        /// Exclusive upper bound on durations, in seconds
        #[arg(long)]
        ceiling: Option<u64>,
    },
}

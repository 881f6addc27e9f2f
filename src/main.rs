mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands};
use oblivion::config::Config;
use oblivion::scrape::ScrapeExtractor;
use oblivion::Oblivion;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    oblivion::logging::init_tracing(cli.json_logs);
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind { config.bind = bind; }
            let bind = config.bind;
            let app = Arc::new(Oblivion::connect(config)?);
            oblivion::server::serve(app, bind).await?;
        }
        Commands::Search { query, invidious } => {
            let app = Oblivion::connect(config)?;
            if invidious {
                let resp = app.invidious_search(&query).await?;
                println!("{}", String::from_utf8_lossy(&resp.body));
            } else {
                for r in app.youtube_search(&query).await? {
                    println!("{} {:>5}s  {} - {}", r.id(), r.duration_secs(), r.author(), r.title());
                }
            }
        }
        Commands::Streams { video_id } => {
            let app = Oblivion::connect(config)?;
            let streams = app.youtube_audio(&video_id).await?;
            println!("{}", serde_json::to_string_pretty(&streams)?);
        }
        Commands::Scrape { file, ceiling } => {
            let html = tokio::fs::read_to_string(&file).await.with_context(|| format!("reading {}", file.display()))?;
            let records = ScrapeExtractor::default().extract(&html, ceiling.unwrap_or(config.duration_ceiling_secs))?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}

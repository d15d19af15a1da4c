//! `roster`: crawl player listings, backfill images and merge datasets.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use roster_crawler::{CrawlConfig, RosterClient};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG: &str = "roster.toml";

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Crawl football player rosters across game versions")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./roster.toml when present)
    #[arg(long, global = true, env = "ROSTER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every version of the selected leagues and write their datasets
    Crawl {
        /// League codes to crawl (all configured leagues if omitted)
        #[arg(short, long = "league")]
        leagues: Vec<String>,
        /// Newest version to crawl
        #[arg(long)]
        from: Option<u16>,
        /// Oldest version to crawl
        #[arg(long)]
        to: Option<u16>,
        /// Skip photo and flag downloads
        #[arg(long)]
        no_assets: bool,
    },

    /// Download missing images for every persisted dataset
    Download {
        /// League codes to backfill (all configured leagues if omitted)
        #[arg(short, long = "league")]
        leagues: Vec<String>,
    },

    /// Fold one dataset into another, keyed by name, team and version
    Merge {
        /// League the datasets belong to
        #[arg(short, long)]
        league: String,
        /// Dataset to read new records from
        #[arg(long)]
        source: PathBuf,
        /// Dataset to merge into (the league's all_players.json if omitted)
        #[arg(long)]
        target: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CrawlConfig> {
    match path {
        Some(path) => CrawlConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => CrawlConfig::load(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("loading config from {DEFAULT_CONFIG}")),
        None => Ok(CrawlConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "roster_crawler=debug,roster=debug"
    } else {
        "roster_crawler=info,roster=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Crawl {
            leagues,
            from,
            to,
            no_assets,
        } => {
            if let Some(from) = from {
                config.crawl.newest_version = from;
            }
            if let Some(to) = to {
                config.crawl.oldest_version = to;
            }
            let client = RosterClient::new(config)?;
            let report = client.run(&leagues, !no_assets).await?;

            for failure in &report.failures {
                error!(
                    league = %failure.league,
                    version = failure.version,
                    halted_league = failure.halted_league,
                    "{}",
                    failure.error
                );
            }
            println!("{}", serde_json::to_string_pretty(&report)?);

            if !report.is_success() {
                bail!("{} job(s) failed", report.failures.len());
            }
        }
        Commands::Download { leagues } => {
            let client = RosterClient::new(config)?;
            let report = client.download(&leagues).await?;
            info!(
                fetched = report.fetched,
                already_present = report.already_present,
                in_flight = report.in_flight,
                failed = report.failures.len(),
                "download finished"
            );
            for failure in &report.failures {
                warn!(reference = %failure.reference, "{}", failure.reason);
            }
        }
        Commands::Merge {
            league,
            source,
            target,
        } => {
            let client = RosterClient::new(config)?;
            let outcome = client
                .merge(&league, &source, target.as_deref())
                .with_context(|| format!("merging {}", source.display()))?;
            println!("New players added: {}", outcome.added);
            println!("Total players in merged file: {}", outcome.total);
        }
    }

    Ok(())
}

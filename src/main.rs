use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use tunefeed::api::{self, ApiSettings, AppState};
use tunefeed::config::Config;
use tunefeed::feed::{FeedFetcher, Ingestor, ParseCache, Snapshot};
use tunefeed::storage::{FeedStore, LegacyFeedEntry, LegacyFeedList, StoreError};

#[derive(Parser, Debug)]
#[command(name = "tunefeed", about = "Music feed ingestion service", version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE", env = "TUNEFEED_CONFIG", default_value = "tunefeed.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Ingest all active feeds once and write the snapshot file
    Snapshot,
    /// Load feeds from a legacy JSON feed list
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?;

    let store = open_store(&config).await?;

    match args.command {
        Command::Serve => serve(config, store).await,
        Command::Snapshot => snapshot(&config, &store).await,
        Command::Import { file } => import(&store, &file).await,
    }
}

async fn open_store(config: &Config) -> Result<FeedStore> {
    let db_path = config
        .database_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;

    match FeedStore::open(db_path).await {
        Ok(store) => Ok(store.with_host_policy(config.host_policy())),
        Err(StoreError::InstanceLocked) => {
            eprintln!(
                "Error: The feed database '{}' is locked by another process.",
                config.database_path.display()
            );
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database: {}", e)),
    }
}

fn ingestor(config: &Config) -> Result<Ingestor> {
    let fetcher = FeedFetcher::new(config.fetcher()).context("Failed to create HTTP client")?;
    Ok(Ingestor::new(
        fetcher,
        ParseCache::new(config.parse_cache_entries),
        config.max_concurrent_fetches,
    ))
}

async fn serve(config: Config, store: FeedStore) -> Result<()> {
    let state = AppState::new(store, ingestor(&config)?, ApiSettings::from(&config));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
        .context("Server terminated unexpectedly")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn snapshot(config: &Config, store: &FeedStore) -> Result<()> {
    let feeds = store.list_active().await.context("Failed to load feeds")?;
    let report = ingestor(config)?.ingest(&feeds).await;

    let snapshot = Snapshot::from_report(report, Utc::now());
    let path = config.snapshot_path.clone();
    let (albums, publishers, failures) = (
        snapshot.albums.len(),
        snapshot.publishers.len(),
        snapshot.failures.len(),
    );

    tokio::task::spawn_blocking(move || snapshot.write_atomic(&path))
        .await
        .context("Snapshot writer task failed")?
        .context("Failed to write snapshot")?;

    println!(
        "Wrote {} albums and {} publishers to {} ({} feeds failed)",
        albums,
        publishers,
        config.snapshot_path.display(),
        failures
    );
    Ok(())
}

async fn import(store: &FeedStore, file: &Path) -> Result<()> {
    // SEC-008: Canonicalize to resolve symlinks
    let canonical = file
        .canonicalize()
        .with_context(|| format!("Failed to resolve import file: {}", file.display()))?;

    let metadata = std::fs::metadata(&canonical)?;
    if !metadata.is_file() {
        anyhow::bail!("Import path must be a regular file");
    }

    let content = std::fs::read(&canonical)
        .with_context(|| format!("Failed to read import file: {}", canonical.display()))?;
    let entries = parse_feed_list(&content)
        .with_context(|| format!("'{}' is not a feed list", canonical.display()))?;

    let summary = store.import(&entries).await.context("Import failed")?;
    println!(
        "Imported {} feeds ({} duplicates, {} invalid skipped)",
        summary.imported, summary.duplicates, summary.invalid
    );
    Ok(())
}

/// Accepts both `{ "feeds": [...] }` and a bare array.
fn parse_feed_list(content: &[u8]) -> Result<Vec<LegacyFeedEntry>, serde_json::Error> {
    match serde_json::from_slice::<LegacyFeedList>(content) {
        Ok(list) => Ok(list.feeds),
        Err(_) => serde_json::from_slice::<Vec<LegacyFeedEntry>>(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_import_subcommand_parses() {
        let args = Args::try_parse_from(["tunefeed", "--config", "x.toml", "import", "feeds.json"]).unwrap();
        assert_eq!(args.config, PathBuf::from("x.toml"));
        assert!(matches!(args.command, Command::Import { ref file } if file == Path::new("feeds.json")));
    }

    #[test]
    fn test_feed_list_both_shapes() {
        let wrapped = br#"{"feeds":[{"originalUrl":"https://a.example.com/rss","type":"album"}]}"#;
        let bare = br#"[{"url":"https://b.example.com/rss","type":"publisher"}]"#;
        assert_eq!(parse_feed_list(wrapped).unwrap().len(), 1);
        assert_eq!(parse_feed_list(bare).unwrap()[0].original_url, "https://b.example.com/rss");
        assert!(parse_feed_list(b"{}").is_err());
    }
}

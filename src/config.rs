//! Configuration file parser for `tunefeed.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::fetcher::{FetcherConfig, DEFAULT_MAX_BYTES, DEFAULT_USER_AGENT};
use crate::feed::ingest::DEFAULT_CONCURRENCY;
use crate::util::HostPolicy;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Where `GET /albums` gets its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlbumsSource {
    /// Run an ingestion pass per request.
    #[default]
    Live,
    /// Serve the last snapshot file.
    Snapshot,
}

/// Top-level service configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server listens on.
    pub bind_addr: String,

    /// SQLite database file holding the feed list.
    pub database_path: PathBuf,

    /// JSON snapshot written by `tunefeed snapshot`.
    pub snapshot_path: PathBuf,

    pub user_agent: String,

    /// Per-feed fetch timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Feed documents larger than this are rejected.
    pub max_feed_bytes: usize,

    /// Feeds fetched in parallel during an ingestion pass.
    pub max_concurrent_fetches: usize,

    /// Parsed documents kept in memory, keyed by content hash.
    pub parse_cache_entries: usize,

    /// Accept feed URLs on localhost and private networks.
    pub allow_private_hosts: bool,

    /// `Cache-Control: max-age` for `GET /feeds`.
    pub feeds_max_age_secs: u64,

    pub albums_source: AlbumsSource,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            database_path: PathBuf::from("tunefeed.db"),
            snapshot_path: PathBuf::from("data/snapshot.json"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout_secs: 30,
            max_feed_bytes: DEFAULT_MAX_BYTES,
            max_concurrent_fetches: DEFAULT_CONCURRENCY,
            parse_cache_entries: 256,
            allow_private_hosts: false,
            feeds_max_age_secs: 600,
            albums_source: AlbumsSource::Live,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 11] = [
        "bind_addr",
        "database_path",
        "snapshot_path",
        "user_agent",
        "fetch_timeout_secs",
        "max_feed_bytes",
        "max_concurrent_fetches",
        "parse_cache_entries",
        "allow_private_hosts",
        "feeds_max_age_secs",
        "albums_source",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            bind_addr = %config.bind_addr,
            database = %config.database_path.display(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn fetcher(&self) -> FetcherConfig {
        FetcherConfig {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.fetch_timeout_secs.max(1)),
            max_bytes: self.max_feed_bytes,
        }
    }

    pub fn host_policy(&self) -> HostPolicy {
        if self.allow_private_hosts {
            HostPolicy::AllowPrivate
        } else {
            HostPolicy::PublicOnly
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("tunefeed_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tunefeed.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.max_feed_bytes, 10 * 1024 * 1024);
        assert_eq!(config.max_concurrent_fetches, 10);
        assert_eq!(config.feeds_max_age_secs, 600);
        assert_eq!(config.albums_source, AlbumsSource::Live);
        assert!(!config.allow_private_hosts);
        assert_eq!(config.host_policy(), HostPolicy::PublicOnly);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/tunefeed_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.fetch_timeout_secs, 30);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config("partial", "fetch_timeout_secs = 5\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.fetch_timeout_secs, 5);
        assert_eq!(config.max_concurrent_fetches, 10);
        assert_eq!(config.fetcher().timeout, Duration::from_secs(5));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
bind_addr = "0.0.0.0:8080"
database_path = "/var/lib/tunefeed/feeds.db"
snapshot_path = "/var/lib/tunefeed/snapshot.json"
user_agent = "custom-agent/1.0"
fetch_timeout_secs = 10
max_feed_bytes = 1024
max_concurrent_fetches = 3
parse_cache_entries = 16
allow_private_hosts = true
feeds_max_age_secs = 60
albums_source = "snapshot"
"#;
        let (dir, path) = write_config("full", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.database_path, PathBuf::from("/var/lib/tunefeed/feeds.db"));
        assert_eq!(config.user_agent, "custom-agent/1.0");
        assert_eq!(config.max_feed_bytes, 1024);
        assert_eq!(config.parse_cache_entries, 16);
        assert_eq!(config.albums_source, AlbumsSource::Snapshot);
        assert_eq!(config.host_policy(), HostPolicy::AllowPrivate);
        assert_eq!(config.fetcher().max_bytes, 1024);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config("unknown", "fetch_timeout_secs = 7\ntheme = \"dark\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.fetch_timeout_secs, 7);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("wrongtype", "fetch_timeout_secs = \"soon\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_albums_source_rejected() {
        let (dir, path) = write_config("albums_source", "albums_source = \"cache\"\n");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        std::fs::remove_dir_all(&dir).ok();
    }
}

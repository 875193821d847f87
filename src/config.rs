//! Configuration management for mediatrack using the prefer crate.
//!
//! `prefer` discovers `mediatrack.{toml,yaml,json}` in the standard
//! locations; the file itself is parsed with serde by extension. Anything
//! left unset falls back to [`Settings::default`] and
//! [`PipelineConfig::default`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, StoreError};
use crate::repository::DbContext;
use crate::scrapers::http_client::USER_AGENT;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "mediatrack.db";

/// Minutes as a duration, saturating on overflow.
pub fn duration_from_minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename, relative to `data_dir` unless absolute.
    pub database_filename: String,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Concurrent queue workers.
    pub workers: usize,
    /// Hard timeout for light (metadata) extraction.
    pub light_timeout: Duration,
    /// Hard timeout for full (body) extraction.
    pub full_timeout: Duration,
    /// Cap on stored article body length, in characters.
    pub max_content_length: usize,
    /// Rows younger than this reject point updates and deletes.
    pub write_buffer: Duration,
    /// The reconciler leaves rows written within this window alone.
    pub recency_window: Duration,
    /// URLs per dedup membership query.
    pub dedup_batch_size: usize,
    /// Row keys per reconciler delete.
    pub delete_batch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mediatrack");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            user_agent: USER_AGENT.to_string(),
            workers: 3,
            light_timeout: Duration::from_secs(5),
            full_timeout: Duration::from_secs(8),
            max_content_length: 50_000,
            write_buffer: Duration::ZERO,
            recency_window: Duration::from_secs(90 * 60),
            dedup_batch_size: 100,
            delete_batch_size: 100,
        }
    }
}

impl Settings {
    /// Get the full path to the database file.
    pub fn database_path(&self) -> PathBuf {
        let file = Path::new(&self.database_filename);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.data_dir.join(file)
        }
    }

    /// Check if the database appears to be initialized.
    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        if let Some(parent) = self.database_path().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Open the configured database, applying pending migrations.
    pub async fn open_db_context(&self) -> Result<DbContext, StoreError> {
        DbContext::open(&self.database_path(), self.write_buffer).await
    }
}

/// Matching rules used by ingestion and enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Domains (and their subdomains) never admitted to the queue.
    pub blocked_domains: Vec<String>,
    /// Title keywords for `antler_in_headline`.
    pub headline_keywords: Vec<String>,
    /// Title/content keywords for `tagged_antler`.
    pub content_keywords: Vec<String>,
    /// Terms that set the kill-pill flag.
    pub kill_pill_terms: Vec<String>,
    /// Terms that set the unwanted flag.
    pub unwanted_terms: Vec<String>,
    /// Portfolio company names matched into `matched_portcos`.
    pub portfolio_companies: Vec<String>,
    /// Language assumed for rows with content but no language.
    pub default_language: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            blocked_domains: vec!["antler.co".to_string()],
            headline_keywords: vec!["antler".to_string()],
            content_keywords: vec!["antler".to_string()],
            kill_pill_terms: Vec::new(),
            unwanted_terms: Vec::new(),
            portfolio_companies: Vec::new(),
            default_language: "en".to_string(),
        }
    }
}

/// Configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename or path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Light extraction timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_timeout_secs: Option<u64>,
    /// Full extraction timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_content_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_buffer_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recency_window_minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_batch_size: Option<usize>,
    /// Matching rules.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    pub async fn load() -> Self {
        match prefer::load("mediatrack").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            // No config file found
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Format is chosen by file extension; anything else is read as JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, Error> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Failed to parse TOML config: {}", e)))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Failed to parse YAML config: {}", e)))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| Error::Config(format!("Failed to parse JSON config: {}", e)))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory of the config file, if loaded from one.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// `~` is expanded; relative paths join onto `base_dir`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = shellexpand::tilde(database).into_owned();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(workers) = self.workers {
            settings.workers = workers.max(1);
        }
        if let Some(secs) = self.light_timeout_secs {
            settings.light_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.full_timeout_secs {
            settings.full_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = self.max_content_length {
            settings.max_content_length = max;
        }
        if let Some(secs) = self.write_buffer_secs {
            settings.write_buffer = Duration::from_secs(secs);
        }
        if let Some(minutes) = self.recency_window_minutes {
            settings.recency_window = duration_from_minutes(minutes);
        }
        if let Some(size) = self.dedup_batch_size {
            settings.dedup_batch_size = size.max(1);
        }
        if let Some(size) = self.delete_batch_size {
            settings.delete_batch_size = size.max(1);
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file (`--config`).
    pub config_path: Option<PathBuf>,
    /// Data directory override (`--data-dir` / `MEDIATRACK_DATA_DIR`).
    pub data_dir: Option<PathBuf>,
    /// Database path override (`--database` / `MEDIATRACK_DATABASE`).
    pub database: Option<PathBuf>,
}

/// Load settings with explicit options.
///
/// Precedence, lowest first: defaults, config file, command-line/env
/// overrides.
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, PipelineConfig), Error> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let mut settings = Settings::default();
    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(data_dir) = options.data_dir {
        settings.data_dir = data_dir;
    }
    if let Some(database) = options.database {
        settings.database_filename = database.display().to_string();
    }

    tracing::debug!(
        data_dir = %settings.data_dir.display(),
        database = %settings.database_path().display(),
        "Resolved settings"
    );
    Ok((settings, config.pipeline))
}

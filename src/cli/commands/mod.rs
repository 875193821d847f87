//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod import;
mod ingest;
mod init;
mod maintenance;
mod queue;
mod records;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};
use crate::models::QueueStatus;
use crate::scrapers::ExtractMode;

#[derive(Parser)]
#[command(name = "mediatrack")]
#[command(about = "Media coverage ingestion, deduplication and enrichment")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides config file)
    #[arg(long, global = true, env = "MEDIATRACK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Database file (overrides config file)
    #[arg(long, global = true, env = "MEDIATRACK_DATABASE")]
    database: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Add URLs to the processing queue
    Add {
        /// URLs to enqueue
        #[arg(required = true)]
        urls: Vec<String>,
        /// Batch name (default: batch_<timestamp>)
        #[arg(short, long)]
        batch: Option<String>,
    },

    /// Enqueue a batch file of `url[\ttitle[\tdate[\tbrand]]]` lines
    Import {
        /// Batch file path
        file: PathBuf,
        /// Batch name (default: batch_<timestamp>)
        #[arg(short, long)]
        batch: Option<String>,
    },

    /// Extract and store a single URL immediately
    Ingest {
        url: String,
        /// Extraction mode
        #[arg(short, long, value_enum, default_value_t = ExtractMode::Light)]
        mode: ExtractMode,
    },

    /// Report which URLs are already stored
    Check {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Process pending queue entries
    Process {
        /// Number of workers (default: from config)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Limit number of entries to process (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: usize,
        /// Extraction mode
        #[arg(short, long, value_enum, default_value_t = ExtractMode::Light)]
        mode: ExtractMode,
        /// Skip the enrichment pass after processing
        #[arg(long)]
        no_enrich: bool,
    },

    /// Run the full enrichment pass over stored articles
    Enrich,

    /// Collapse duplicate articles sharing a normalized URL
    Reconcile {
        /// Show what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
        /// Leave rows written within this many minutes alone (default: from config)
        #[arg(long)]
        window_minutes: Option<u64>,
    },

    /// Full-scrape stored articles that have no body text
    Backfill {
        /// Maximum articles to scrape
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },

    /// Manage the processing queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },

    /// Inspect and maintain stored articles
    Records {
        #[command(subcommand)]
        command: RecordsCommands,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Show entry counts per status
    Status {
        /// Limit to one batch
        #[arg(short, long)]
        batch: Option<String>,
    },
    /// List entries with a given status
    List {
        #[arg(short, long, value_parser = parse_status, default_value = "pending")]
        status: QueueStatus,
        #[arg(short, long)]
        batch: Option<String>,
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },
    /// Mark every entry in a batch completed
    Clear {
        batch: String,
        /// Confirm clearing
        #[arg(long)]
        confirm: bool,
    },
    /// Return failed entries to pending
    Retry {
        #[arg(short, long)]
        batch: Option<String>,
    },
    /// Delete a housekeeping batch entirely
    Purge {
        batch: String,
        /// Confirm deletion
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(Subcommand)]
enum RecordsCommands {
    /// Show per-field completeness counts
    Report,
    /// List articles missing required fields
    Incomplete {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Add an article by hand (content is required)
    Add {
        url: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long)]
        content: String,
        /// Publish date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        date: Option<String>,
    },
    /// Delete articles that have no numeric id
    PurgeNullIds {
        #[arg(long)]
        confirm: bool,
    },
    /// Delete articles by id or URL pattern
    Delete {
        /// Article ids
        #[arg(long = "id", num_args = 1..)]
        ids: Vec<i64>,
        /// URL pattern; `*` is a wildcard, otherwise matches as a substring
        #[arg(long, conflicts_with = "ids")]
        url_pattern: Option<String>,
        #[arg(long)]
        confirm: bool,
    },
    /// Edit fields of one article: `field=value ...`
    Edit {
        id: i64,
        #[arg(required = true)]
        assignments: Vec<String>,
    },
}

fn parse_status(s: &str) -> Result<QueueStatus, String> {
    QueueStatus::from_str(&s.to_lowercase())
        .ok_or_else(|| format!("unknown status '{}' (pending, processing, completed, failed)", s))
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data_dir: cli.data_dir,
        database: cli.database,
    };
    let (settings, pipeline) = load_settings_with_options(options).await?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Add { urls, batch } => {
            import::cmd_add(&settings, &pipeline, urls, batch.as_deref()).await
        }
        Commands::Import { file, batch } => {
            import::cmd_import(&settings, &pipeline, &file, batch.as_deref()).await
        }
        Commands::Check { urls } => import::cmd_check(&settings, &urls).await,
        Commands::Ingest { url, mode } => ingest::cmd_ingest(&settings, pipeline, &url, mode).await,
        Commands::Process {
            workers,
            limit,
            mode,
            no_enrich,
        } => {
            let workers = workers.unwrap_or(settings.workers);
            let limit = if limit > 0 { Some(limit) } else { None };
            ingest::cmd_process(&settings, pipeline, workers, limit, mode, !no_enrich).await
        }
        Commands::Backfill { limit } => ingest::cmd_backfill(&settings, &pipeline, limit).await,
        Commands::Enrich => maintenance::cmd_enrich(&settings, pipeline).await,
        Commands::Reconcile {
            dry_run,
            window_minutes,
        } => maintenance::cmd_reconcile(&settings, dry_run, window_minutes).await,
        Commands::Queue { command } => match command {
            QueueCommands::Status { batch } => queue::cmd_status(&settings, batch.as_deref()).await,
            QueueCommands::List {
                status,
                batch,
                limit,
            } => queue::cmd_list(&settings, status, batch.as_deref(), limit).await,
            QueueCommands::Clear { batch, confirm } => {
                queue::cmd_clear(&settings, &batch, confirm).await
            }
            QueueCommands::Retry { batch } => queue::cmd_retry(&settings, batch.as_deref()).await,
            QueueCommands::Purge { batch, confirm } => {
                queue::cmd_purge(&settings, &batch, confirm).await
            }
        },
        Commands::Records { command } => match command {
            RecordsCommands::Report => records::cmd_report(&settings).await,
            RecordsCommands::Incomplete { limit } => records::cmd_incomplete(&settings, limit).await,
            RecordsCommands::Add {
                url,
                title,
                content,
                date,
            } => records::cmd_add(&settings, url, title, content, date).await,
            RecordsCommands::PurgeNullIds { confirm } => {
                records::cmd_purge_null_ids(&settings, confirm).await
            }
            RecordsCommands::Delete {
                ids,
                url_pattern,
                confirm,
            } => records::cmd_delete(&settings, ids, url_pattern.as_deref(), confirm).await,
            RecordsCommands::Edit { id, assignments } => {
                records::cmd_edit(&settings, id, &assignments).await
            }
        },
    }
}

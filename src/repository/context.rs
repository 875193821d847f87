//! Database context for managing connections and repository access.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use super::articles::ArticleRepository;
use super::domains::DomainRepository;
use super::migrations::run_migrations;
use super::pool::DbPool;
use super::queue::QueueRepository;
use crate::error::StoreError;

/// Entry point for database operations.
///
/// Create one context per command or service, then use it to access all
/// repositories. Article inserts made through repositories from the same
/// context signal [`DbContext::enrichment_signal`].
///
/// # Example
/// ```ignore
/// let ctx = DbContext::open(&db_path, Duration::ZERO).await?;
/// let report = ctx.queue().enqueue(urls, None, &blocked).await?;
/// ```
#[derive(Clone)]
pub struct DbContext {
    pool: DbPool,
    write_buffer: Duration,
    enrichment_signal: Arc<Notify>,
}

impl DbContext {
    /// Create a context for a database URL without touching the schema.
    pub fn from_url(database_url: &str, write_buffer: Duration) -> Self {
        Self::with_pool(DbPool::new(database_url), write_buffer)
    }

    fn with_pool(pool: DbPool, write_buffer: Duration) -> Self {
        Self {
            pool,
            write_buffer,
            enrichment_signal: Arc::new(Notify::new()),
        }
    }

    /// Open a database file and apply pending migrations.
    pub async fn open(path: &Path, write_buffer: Duration) -> Result<Self, StoreError> {
        let ctx = Self::with_pool(DbPool::from_path(path), write_buffer);
        ctx.migrate().await?;
        Ok(ctx)
    }

    /// Apply pending migrations, returning the names applied.
    pub async fn migrate(&self) -> Result<Vec<String>, StoreError> {
        run_migrations(self.pool.database_url()).await
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Notified after each successful article insert.
    pub fn enrichment_signal(&self) -> Arc<Notify> {
        self.enrichment_signal.clone()
    }

    /// Get an article repository.
    pub fn articles(&self) -> ArticleRepository {
        ArticleRepository::new(self.pool.clone())
            .with_write_buffer(self.write_buffer)
            .with_enrichment_signal(self.enrichment_signal.clone())
    }

    /// Get a queue repository.
    pub fn queue(&self) -> QueueRepository {
        QueueRepository::new(self.pool.clone())
    }

    /// Get a domain metadata repository.
    pub fn domains(&self) -> DomainRepository {
        DomainRepository::new(self.pool.clone())
    }
}

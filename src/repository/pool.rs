//! SQLite connection handling.
//!
//! SQLite connections are lightweight, so a new connection is opened per
//! request instead of pooling. Each connection waits on locks for up to the
//! busy timeout before reporting `database is locked`.

use std::path::Path;
use std::time::Duration;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, SimpleAsyncConnection};

use super::util::to_diesel_error;

/// Diesel error type alias.
pub type DbError = diesel::result::Error;

/// Async SQLite connection type.
pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection factory for a SQLite database file.
#[derive(Clone, Debug)]
pub struct DbPool {
    database_url: String,
    busy_timeout: Duration,
}

impl DbPool {
    /// Create a pool for a database URL (`sqlite:` prefix optional).
    pub fn new(database_url: &str) -> Self {
        let url = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Create pool from a file path.
    pub fn from_path(path: &Path) -> Self {
        Self::new(&path.display().to_string())
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Get a connection.
    pub async fn get(&self) -> Result<SqliteConn, DbError> {
        let mut conn = SqliteConn::establish(&self.database_url)
            .await
            .map_err(to_diesel_error)?;
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA journal_mode = WAL;",
            self.busy_timeout.as_millis()
        ))
        .await?;
        Ok(conn)
    }

    /// Get the database URL.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

/// Macro for running database operations on a fresh connection.
///
/// # Example
/// ```ignore
/// with_conn!(self.pool, conn => {
///     articles::table.count().get_result::<i64>(&mut conn).await
/// })
/// ```
#[macro_export]
macro_rules! with_conn {
    ($pool:expr, $conn:ident => $body:expr) => {{
        let mut $conn = $pool.get().await?;
        $body
    }};
}

#[allow(unused_imports)]
pub use with_conn;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_prefix_stripped() {
        assert_eq!(DbPool::new("sqlite:/tmp/x.db").database_url(), "/tmp/x.db");
        assert_eq!(DbPool::new("/tmp/x.db").database_url(), "/tmp/x.db");
    }

    #[tokio::test]
    async fn test_connection_applies_pragmas() {
        use diesel::sql_types::BigInt;
        use diesel_async::RunQueryDsl;

        #[derive(diesel::QueryableByName)]
        struct Timeout {
            #[diesel(sql_type = BigInt)]
            timeout: i64,
        }

        let dir = tempfile::tempdir().unwrap();
        let pool = DbPool::from_path(&dir.path().join("t.db"))
            .with_busy_timeout(Duration::from_millis(1234));
        let mut conn = pool.get().await.unwrap();
        let row: Timeout = diesel::sql_query("PRAGMA busy_timeout")
            .get_result(&mut conn)
            .await
            .unwrap();
        assert_eq!(row.timeout, 1234);
    }
}

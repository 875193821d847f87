//! Schema Tests
//!
//! Verifies that the cetane migrations produce the schema the repositories
//! rely on: nullable enrichment columns, a non-unique normalized URL index,
//! and the queue and domain tables.

use std::collections::BTreeMap;

use rusqlite::{Connection, Result as SqliteResult};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnInfo {
    col_type: String,
    not_null: bool,
    primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexInfo {
    table: String,
    columns: Vec<String>,
    unique: bool,
}

/// Run cetane migrations (generates SQL for SQLite backend)
fn run_cetane_migrations(conn: &Connection) -> SqliteResult<()> {
    use cetane::backend::Sqlite;

    let registry = mediatrack::migrations::registry();
    let backend = Sqlite;

    let ordered_names = registry
        .resolve_order()
        .expect("Failed to resolve migration order");

    for name in ordered_names {
        let migration = registry
            .get(name)
            .expect("Migration not found after resolve");
        for stmt in migration.forward_sql(&backend) {
            if stmt.trim().is_empty() {
                continue;
            }
            conn.execute_batch(&stmt)?;
        }
    }
    Ok(())
}

fn migrated() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to open DB");
    run_cetane_migrations(&conn).expect("Failed to run migrations");
    conn
}

fn table_columns(conn: &Connection, table: &str) -> SqliteResult<BTreeMap<String, ColumnInfo>> {
    let mut pragma = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
    let rows = pragma.query_map([], |row| {
        Ok((
            row.get::<_, String>(1)?,
            ColumnInfo {
                col_type: row.get::<_, String>(2)?.to_uppercase(),
                not_null: row.get(3)?,
                primary_key: row.get::<_, i32>(5)? > 0,
            },
        ))
    })?;
    rows.collect()
}

fn indexes(conn: &Connection) -> SqliteResult<BTreeMap<String, IndexInfo>> {
    let mut stmt = conn.prepare(
        "SELECT name, tbl_name, sql FROM sqlite_master WHERE type='index' AND sql IS NOT NULL ORDER BY name",
    )?;
    let found: Vec<(String, String, bool)> = stmt
        .query_map([], |row| {
            let sql: String = row.get(2)?;
            Ok((row.get(0)?, row.get(1)?, sql.to_uppercase().contains("UNIQUE")))
        })?
        .collect::<SqliteResult<_>>()?;

    let mut indexes = BTreeMap::new();
    for (name, table, unique) in found {
        let mut pragma = conn.prepare(&format!("PRAGMA index_info(\"{}\")", name))?;
        let columns = pragma
            .query_map([], |row| row.get::<_, String>(2))?
            .collect::<SqliteResult<Vec<_>>>()?;
        indexes.insert(
            name,
            IndexInfo {
                table,
                columns,
                unique,
            },
        );
    }
    Ok(indexes)
}

#[test]
fn test_article_table_shape() {
    let conn = migrated();
    let columns = table_columns(&conn, "articles").expect("Failed to read articles");

    assert!(columns["row_key"].primary_key);
    assert!(!columns["id"].not_null, "legacy id must allow NULL");
    assert!(columns["normalized_url"].not_null);

    for enrichment in [
        "country",
        "language",
        "tier",
        "month",
        "tagged_antler",
        "kill_pill_count",
        "is_complete",
    ] {
        assert!(
            !columns[enrichment].not_null,
            "{} must be nullable so unenriched rows are detectable",
            enrichment
        );
    }
    assert_eq!(columns["page_rank"].col_type, "REAL");
    assert_eq!(columns.len(), 40);
}

#[test]
fn test_normalized_url_index_is_not_unique() {
    let conn = migrated();
    let indexes = indexes(&conn).expect("Failed to read indexes");

    let normalized = &indexes["idx_articles_normalized_url"];
    assert_eq!(normalized.table, "articles");
    assert_eq!(normalized.columns, vec!["normalized_url"]);
    assert!(!normalized.unique);

    // Two rows for one normalized URL are storable; the reconciler collapses them.
    conn.execute_batch(
        "INSERT INTO articles (url, normalized_url, updated_at, inserted_at)
             VALUES ('a', 'https://a.com/x', '', '');
         INSERT INTO articles (url, normalized_url, updated_at, inserted_at)
             VALUES ('b', 'https://a.com/x', '', '');",
    )
    .expect("duplicate normalized urls should insert");
}

#[test]
fn test_queue_and_domain_tables() {
    let conn = migrated();

    let queue = table_columns(&conn, "processing_queue").expect("Failed to read queue");
    for column in ["id", "url", "status", "batch_name", "retry_count", "hint_brand"] {
        assert!(queue.contains_key(column), "missing queue column {}", column);
    }
    assert!(queue["id"].primary_key);

    let domains = table_columns(&conn, "domains").expect("Failed to read domains");
    assert!(domains["domain"].primary_key);
    assert!(domains.contains_key("signal_score"));

    let indexes = indexes(&conn).expect("Failed to read indexes");
    let claim = &indexes["idx_queue_status_created"];
    assert_eq!(claim.columns, vec!["status", "created_at"]);
}

#[test]
fn test_migrations_apply_once() {
    use cetane::backend::Sqlite;

    let registry = mediatrack::migrations::registry();
    let ordered = registry
        .resolve_order()
        .expect("Failed to resolve migration order");
    assert_eq!(ordered.len(), 1);

    let conn = migrated();
    // Re-running a CREATE TABLE migration against a migrated database fails,
    // which is why the migrator tracks applied names.
    let first = ordered.into_iter().next().expect("No migrations registered");
    let migration = registry.get(first).expect("Migration not found");
    let rerun = migration
        .forward_sql(&Sqlite)
        .iter()
        .try_for_each(|stmt| conn.execute_batch(stmt));
    assert!(rerun.is_err());
}

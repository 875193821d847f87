use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0001_initial")
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE articles (
    row_key INTEGER PRIMARY KEY AUTOINCREMENT,
    id INTEGER,
    url TEXT NOT NULL,
    normalized_url TEXT NOT NULL,
    domain TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL DEFAULT '',
    publish_date TEXT,
    updated_at TEXT NOT NULL,
    inserted_at TEXT NOT NULL,
    country TEXT,
    language TEXT,
    tier TEXT,
    page_rank REAL,
    social_shares_count INTEGER,
    backlinks REAL,
    month TEXT,
    tagged_antler INTEGER,
    tagged_portco INTEGER,
    antler_in_headline INTEGER,
    unbranded_win INTEGER,
    matched_spokespeople TEXT,
    matched_reporter TEXT,
    matched_portcos TEXT,
    matched_vc_investors TEXT,
    matched_vehicle TEXT,
    matched_portco_location TEXT,
    matched_portco_deal_lead TEXT,
    managed_by_fund TEXT,
    kill_pill INTEGER,
    kill_pill_context TEXT,
    kill_pill_count INTEGER,
    unwanted INTEGER,
    unwanted_context TEXT,
    unwanted_count INTEGER,
    text_scraped INTEGER,
    text_scraped_at TEXT,
    text_scrape_error TEXT,
    data_ingestion INTEGER,
    is_complete INTEGER
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_articles_normalized_url ON articles(normalized_url)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_articles_id ON articles(id)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_articles_domain ON articles(domain)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE processing_queue (
    id TEXT PRIMARY KEY NOT NULL,
    url TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    batch_name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    error_message TEXT NOT NULL DEFAULT '',
    retry_count INTEGER NOT NULL DEFAULT 0,
    hint_title TEXT,
    hint_publish_date TEXT,
    hint_brand TEXT
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_queue_status_created ON processing_queue(status, created_at)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_queue_url ON processing_queue(url)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_queue_batch ON processing_queue(batch_name)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE domains (
    domain TEXT PRIMARY KEY NOT NULL,
    page_rank REAL NOT NULL DEFAULT 0,
    llm_rank REAL NOT NULL DEFAULT 0,
    hn_citation REAL NOT NULL DEFAULT 0,
    signal_score REAL NOT NULL DEFAULT 0,
    tier TEXT NOT NULL DEFAULT '',
    country TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE id_sequences (
    name TEXT PRIMARY KEY NOT NULL,
    last_id INTEGER NOT NULL
)"#,
        ))
}

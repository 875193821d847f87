//! Bulk `UPDATE ... WHERE` passes.
//!
//! Each operation only touches rows outside the write buffer and only writes
//! where the stored value is still unset, except for the explicit per-row
//! flag setter. None of them touch `updated_at`.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::ArticleRepository;
use crate::error::StoreError;
use crate::models::{month_of, Article, DomainMetadata};
use crate::repository::diesel_models::ArticleRecord;
use crate::repository::{format_datetime, parse_datetime};
use crate::schema::articles;
use crate::with_conn;

/// Set a nullable column to its default wherever it is NULL.
macro_rules! fill_null {
    ($conn:expr, $cutoff:expr, $column:ident, $value:expr) => {
        diesel::update(
            articles::table
                .filter(articles::$column.is_null())
                .filter(articles::inserted_at.le($cutoff)),
        )
        .set(articles::$column.eq($value))
        .execute($conn)
        .await?
    };
}

/// Apply a per-row assignment to `(row_key, value)` pairs in one transaction.
macro_rules! set_per_row {
    ($conn:expr, $cutoff:expr, $rows:expr, |$value:ident| $set:expr) => {{
        let rows = $rows;
        let cutoff = $cutoff.to_string();
        $conn
            .transaction::<usize, StoreError, _>(|conn| {
                Box::pin(async move {
                    let mut changed = 0;
                    for (row_key, $value) in rows {
                        changed += diesel::update(
                            articles::table
                                .filter(articles::row_key.eq(row_key))
                                .filter(articles::inserted_at.le(&cutoff)),
                        )
                        .set($set)
                        .execute(conn)
                        .await?;
                    }
                    Ok(changed)
                })
            })
            .await?
    }};
}

/// Boolean columns that enrichment may recompute per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagColumn {
    AntlerInHeadline,
    TaggedAntler,
    IsComplete,
}

/// Term-matching column groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermField {
    KillPill,
    Unwanted,
}

/// A positive term match for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchUpdate {
    pub row_key: i64,
    pub count: i32,
    pub context: String,
}

impl ArticleRepository {
    /// Articles outside the write buffer, in storage order.
    pub async fn get_mutable(&self) -> Result<Vec<Article>, StoreError> {
        let cutoff = self.buffer_cutoff(Utc::now());
        with_conn!(self.pool, conn => {
            let records = articles::table
                .filter(articles::inserted_at.le(&cutoff))
                .order(articles::row_key.asc())
                .select(ArticleRecord::as_select())
                .load::<ArticleRecord>(&mut conn)
                .await?;
            Ok(records.into_iter().map(Article::from).collect())
        })
    }

    /// Derive `month` from `publish_date` where it is unset.
    ///
    /// Rows with no usable publish date get the month of `now`.
    pub async fn fill_missing_months(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let cutoff = self.buffer_cutoff(Utc::now());
        with_conn!(self.pool, conn => {
            let pending: Vec<(i64, Option<String>)> = articles::table
                .filter(articles::month.is_null().or(articles::month.eq("")))
                .filter(articles::inserted_at.le(&cutoff))
                .select((articles::row_key, articles::publish_date))
                .load(&mut conn)
                .await?;

            let rows: Vec<(i64, String)> = pending
                .into_iter()
                .map(|(row_key, published)| {
                    let date = published
                        .as_deref()
                        .map(parse_datetime)
                        .filter(|d| *d != DateTime::UNIX_EPOCH)
                        .unwrap_or(now);
                    (row_key, month_of(date))
                })
                .collect();

            Ok(set_per_row!(conn, cutoff, rows, |month| articles::month.eq(Some(month))))
        })
    }

    /// Replace every NULL column with its type default.
    pub async fn fill_null_defaults(&self) -> Result<usize, StoreError> {
        let cutoff = self.buffer_cutoff(Utc::now());
        let epoch = format_datetime(DateTime::UNIX_EPOCH);

        with_conn!(self.pool, conn => {
            let mut filled = 0;
            filled += fill_null!(&mut conn, &cutoff, publish_date, &epoch);
            filled += fill_null!(&mut conn, &cutoff, country, "");
            filled += fill_null!(&mut conn, &cutoff, language, "");
            filled += fill_null!(&mut conn, &cutoff, tier, "");
            filled += fill_null!(&mut conn, &cutoff, page_rank, 0.0);
            filled += fill_null!(&mut conn, &cutoff, social_shares_count, 0i64);
            filled += fill_null!(&mut conn, &cutoff, backlinks, 0.0);
            filled += fill_null!(&mut conn, &cutoff, tagged_antler, false);
            filled += fill_null!(&mut conn, &cutoff, tagged_portco, false);
            filled += fill_null!(&mut conn, &cutoff, antler_in_headline, false);
            filled += fill_null!(&mut conn, &cutoff, unbranded_win, false);
            filled += fill_null!(&mut conn, &cutoff, matched_spokespeople, "");
            filled += fill_null!(&mut conn, &cutoff, matched_reporter, "");
            filled += fill_null!(&mut conn, &cutoff, matched_portcos, "");
            filled += fill_null!(&mut conn, &cutoff, matched_vc_investors, "");
            filled += fill_null!(&mut conn, &cutoff, matched_vehicle, "");
            filled += fill_null!(&mut conn, &cutoff, matched_portco_location, "");
            filled += fill_null!(&mut conn, &cutoff, matched_portco_deal_lead, "");
            filled += fill_null!(&mut conn, &cutoff, managed_by_fund, "");
            filled += fill_null!(&mut conn, &cutoff, kill_pill, false);
            filled += fill_null!(&mut conn, &cutoff, kill_pill_context, "");
            filled += fill_null!(&mut conn, &cutoff, kill_pill_count, 0);
            filled += fill_null!(&mut conn, &cutoff, unwanted, false);
            filled += fill_null!(&mut conn, &cutoff, unwanted_context, "");
            filled += fill_null!(&mut conn, &cutoff, unwanted_count, 0);
            filled += fill_null!(&mut conn, &cutoff, text_scraped, false);
            filled += fill_null!(&mut conn, &cutoff, text_scraped_at, &epoch);
            filled += fill_null!(&mut conn, &cutoff, text_scrape_error, "");
            filled += fill_null!(&mut conn, &cutoff, data_ingestion, false);
            filled += fill_null!(&mut conn, &cutoff, is_complete, false);
            Ok(filled)
        })
    }

    /// Copy country, tier, and page rank from domain metadata into rows of
    /// that domain whose own values are still default.
    pub async fn backfill_from_domain(&self, meta: &DomainMetadata) -> Result<usize, StoreError> {
        let cutoff = self.buffer_cutoff(Utc::now());
        with_conn!(self.pool, conn => {
            let mut changed = 0;
            if !meta.country.is_empty() {
                changed += diesel::update(
                    articles::table
                        .filter(articles::domain.eq(&meta.domain))
                        .filter(articles::country.eq(""))
                        .filter(articles::inserted_at.le(&cutoff)),
                )
                .set(articles::country.eq(Some(&meta.country)))
                .execute(&mut conn)
                .await?;
            }
            if !meta.tier.is_empty() {
                changed += diesel::update(
                    articles::table
                        .filter(articles::domain.eq(&meta.domain))
                        .filter(articles::tier.eq(""))
                        .filter(articles::inserted_at.le(&cutoff)),
                )
                .set(articles::tier.eq(Some(&meta.tier)))
                .execute(&mut conn)
                .await?;
            }
            if meta.page_rank != 0.0 {
                changed += diesel::update(
                    articles::table
                        .filter(articles::domain.eq(&meta.domain))
                        .filter(articles::page_rank.eq(0.0))
                        .filter(articles::inserted_at.le(&cutoff)),
                )
                .set(articles::page_rank.eq(Some(meta.page_rank)))
                .execute(&mut conn)
                .await?;
            }
            Ok(changed)
        })
    }

    /// Set `language` on rows that have content but no language yet.
    pub async fn fill_default_language(&self, language: &str) -> Result<usize, StoreError> {
        let cutoff = self.buffer_cutoff(Utc::now());
        with_conn!(self.pool, conn => {
            diesel::update(
                articles::table
                    .filter(articles::content.ne(""))
                    .filter(articles::language.eq("").or(articles::language.is_null()))
                    .filter(articles::inserted_at.le(&cutoff)),
            )
            .set(articles::language.eq(Some(language)))
            .execute(&mut conn)
            .await
            .map_err(StoreError::from)
        })
    }

    /// Write recomputed boolean values per row.
    pub async fn set_flags(
        &self,
        column: FlagColumn,
        rows: Vec<(i64, bool)>,
    ) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let cutoff = self.buffer_cutoff(Utc::now());
        with_conn!(self.pool, conn => {
            let changed = match column {
                FlagColumn::AntlerInHeadline => {
                    set_per_row!(conn, cutoff, rows, |flag| articles::antler_in_headline.eq(Some(flag)))
                }
                FlagColumn::TaggedAntler => {
                    set_per_row!(conn, cutoff, rows, |flag| articles::tagged_antler.eq(Some(flag)))
                }
                FlagColumn::IsComplete => {
                    set_per_row!(conn, cutoff, rows, |flag| articles::is_complete.eq(Some(flag)))
                }
            };
            Ok(changed)
        })
    }

    /// Record positive term matches: flag, count, and context together.
    pub async fn set_term_matches(
        &self,
        field: TermField,
        matches: Vec<MatchUpdate>,
    ) -> Result<usize, StoreError> {
        if matches.is_empty() {
            return Ok(0);
        }
        let cutoff = self.buffer_cutoff(Utc::now());
        let rows: Vec<(i64, (i32, String))> = matches
            .into_iter()
            .map(|m| (m.row_key, (m.count, m.context)))
            .collect();

        with_conn!(self.pool, conn => {
            let changed = match field {
                TermField::KillPill => set_per_row!(conn, cutoff, rows, |hit| (
                    articles::kill_pill.eq(Some(true)),
                    articles::kill_pill_count.eq(Some(hit.0)),
                    articles::kill_pill_context.eq(Some(hit.1)),
                )),
                TermField::Unwanted => set_per_row!(conn, cutoff, rows, |hit| (
                    articles::unwanted.eq(Some(true)),
                    articles::unwanted_count.eq(Some(hit.0)),
                    articles::unwanted_context.eq(Some(hit.1)),
                )),
            };
            Ok(changed)
        })
    }

    /// Fill `matched_portcos` on rows where it is still empty.
    pub async fn set_matched_portcos(&self, rows: Vec<(i64, String)>) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let cutoff = self.buffer_cutoff(Utc::now());
        with_conn!(self.pool, conn => {
            Ok(set_per_row!(conn, cutoff, rows, |names| articles::matched_portcos.eq(Some(names))))
        })
    }

    /// Set `tagged_portco` on rows that have a matched portfolio company.
    pub async fn tag_portco_from_matches(&self) -> Result<usize, StoreError> {
        let cutoff = self.buffer_cutoff(Utc::now());
        with_conn!(self.pool, conn => {
            diesel::update(
                articles::table
                    .filter(articles::tagged_portco.eq(false))
                    .filter(articles::matched_portcos.ne(""))
                    .filter(articles::inserted_at.le(&cutoff)),
            )
            .set(articles::tagged_portco.eq(Some(true)))
            .execute(&mut conn)
            .await
            .map_err(StoreError::from)
        })
    }
}

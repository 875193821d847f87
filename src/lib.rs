//! mediatrack - media coverage ingestion and enrichment.
//!
//! Tracks articles mentioning a company and its portfolio: URLs are
//! normalized, checked against the store, queued, extracted, stored once per
//! normalized URL, and enriched with derived fields.

pub mod cli;
pub mod config;
pub mod error;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod services;
pub mod utils;

pub use error::{Error, Result};

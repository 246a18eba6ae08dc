//! Command handlers for the CLI.
//!
//! Each handler runs after `main` has loaded config and built the store, and
//! prints its result to stdout as pretty JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use pagevault_core::{HistoryFilters, NewPageSnapshot, Pagination, SearchFilters, StatsPeriod};
use pagevault_db::{Deadline, Store};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest page size accepted from the command line.
const MAX_PER_PAGE: u32 = 100;

#[derive(Debug)]
pub(crate) struct SearchArgs {
    pub query: String,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub source: Option<String>,
    pub discount: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestOutcome {
    file: PathBuf,
    receipt: pagevault_core::IngestReceipt,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Deserialize)]
struct Wrapped {
    #[serde(rename = "pageData")]
    page_data: Option<NewPageSnapshot>,
}

/// Parses a snapshot document, accepting either the bare snapshot or the
/// HTTP body shape `{"pageData": {...}}`.
///
/// Both shapes are read straight from the text so numeric weights keep their
/// literal form.
pub(crate) fn parse_snapshot(raw: &str) -> anyhow::Result<NewPageSnapshot> {
    if let Wrapped {
        page_data: Some(snapshot),
    } = serde_json::from_str(raw)?
    {
        return Ok(snapshot);
    }
    Ok(serde_json::from_str(raw)?)
}

pub(crate) async fn run_migrate(store: &Store) -> anyhow::Result<()> {
    let applied = pagevault_db::run_migrations(store.pool()).await?;
    tracing::info!(applied, "migrations complete");
    print_json(&serde_json::json!({ "applied": applied }))
}

/// Ingests each file in order, stopping at the first failure.
///
/// # Errors
///
/// Returns an error naming the file that could not be read, parsed, or
/// stored. Files before it stay committed.
pub(crate) async fn run_ingest(
    store: &Store,
    timeout: Duration,
    files: &[PathBuf],
) -> anyhow::Result<()> {
    let mut outcomes = Vec::with_capacity(files.len());
    for file in files {
        let receipt = ingest_file(store, timeout, file)
            .await
            .with_context(|| format!("failed to ingest {}", file.display()))?;
        outcomes.push(IngestOutcome {
            file: file.clone(),
            receipt,
        });
    }
    print_json(&outcomes)
}

async fn ingest_file(
    store: &Store,
    timeout: Duration,
    file: &Path,
) -> anyhow::Result<pagevault_core::IngestReceipt> {
    let raw = tokio::fs::read_to_string(file).await?;
    let mut snapshot = parse_snapshot(&raw)?;
    snapshot.apply_defaults(Utc::now(), Some(concat!("pagevault-cli/", env!("CARGO_PKG_VERSION"))));
    Ok(store.ingest(&snapshot, Deadline::after(timeout)).await?)
}

pub(crate) async fn run_stats(
    store: &Store,
    timeout: Duration,
    url: Option<&str>,
    period: Option<&str>,
) -> anyhow::Result<()> {
    match url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => {
            let stats = store
                .url_statistics(url, StatsPeriod::parse(period), Deadline::after(timeout))
                .await?;
            print_json(&stats)
        }
        None => {
            let stats = store.global_statistics(Deadline::after(timeout)).await?;
            print_json(&stats)
        }
    }
}

pub(crate) async fn run_search(
    store: &Store,
    timeout: Duration,
    args: &SearchArgs,
) -> anyhow::Result<()> {
    let pagination = Pagination::search(args.page, args.per_page).capped(MAX_PER_PAGE);
    let filters = SearchFilters::from_raw(
        args.min_price,
        args.max_price,
        args.source.as_deref(),
        args.discount,
    );
    let page = store
        .search_products(&args.query, pagination, &filters, Deadline::after(timeout))
        .await?;
    print_json(&page)
}

pub(crate) async fn run_delete(store: &Store, timeout: Duration, id: Uuid) -> anyhow::Result<()> {
    store.delete_snapshot(id, Deadline::after(timeout)).await?;
    print_json(&serde_json::json!({ "id": id, "deleted": true }))
}

#[derive(Debug)]
pub(crate) struct HistoryArgs {
    pub url: String,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub source: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub success_only: bool,
}

pub(crate) async fn run_history(
    store: &Store,
    timeout: Duration,
    args: &HistoryArgs,
) -> anyhow::Result<()> {
    let pagination = Pagination::history(args.page, args.per_page).capped(MAX_PER_PAGE);
    let filters = HistoryFilters::from_raw(
        args.source.as_deref(),
        args.date_from.as_deref(),
        args.date_to.as_deref(),
        args.success_only,
    );
    let page = store
        .history(&args.url, pagination, &filters, Deadline::after(timeout))
        .await?;
    print_json(&page)
}

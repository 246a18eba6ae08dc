//! Rollup result types and the time windows they are computed over.

use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::snapshot::{SnapshotSummary, Stats};

/// Window for per-URL statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    Day,
    Week,
    Month,
    Year,
    /// The trailing 30 days; used for any unrecognised or missing token.
    #[serde(rename = "30d")]
    Rolling30Days,
}

impl StatsPeriod {
    /// Maps `day|week|month|year`; anything else is the 30-day default.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("day") => Self::Day,
            Some("week") => Self::Week,
            Some("month") => Self::Month,
            Some("year") => Self::Year,
            _ => Self::Rolling30Days,
        }
    }

    /// Start of the window ending at `now`.
    ///
    /// `Month` and `Year` step back whole calendar months, clamping to the
    /// end of shorter months (Mar 31 - 1 month = Feb 28/29).
    #[must_use]
    pub fn window_start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Day => now - Duration::hours(24),
            Self::Week => now - Duration::days(7),
            Self::Month => now
                .checked_sub_months(Months::new(1))
                .unwrap_or(now - Duration::days(30)),
            Self::Year => now
                .checked_sub_months(Months::new(12))
                .unwrap_or(now - Duration::days(365)),
            Self::Rolling30Days => now - Duration::days(30),
        }
    }
}

/// Scrape and product figures for one URL inside a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlStatistics {
    pub url: String,
    pub period: StatsPeriod,
    pub window_start: DateTime<Utc>,
    pub total_scrapes: i64,
    pub successful_scrapes: i64,
    pub first_scraped_at: Option<DateTime<Utc>>,
    pub last_scraped_at: Option<DateTime<Utc>>,
    /// Denormalized stats of the latest in-window snapshot.
    pub last_stats: Option<Stats>,
    /// Product rows currently owned by in-window snapshots of the URL.
    pub total_products: i64,
    pub unique_products: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub min_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub max_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalOverview {
    pub total_scrapes: i64,
    pub successful_scrapes: i64,
    pub total_products: i64,
    pub unique_urls: i64,
    pub last_24_hours: i64,
    pub last_7_days: i64,
    pub last_30_days: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub min_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub max_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    pub source: String,
    pub product_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStatistics {
    pub overview: GlobalOverview,
    /// Top sources by product count, at most [`TOP_SOURCES_LIMIT`].
    pub top_sources: Vec<SourceSummary>,
    /// Newest snapshots first, at most [`RECENT_SNAPSHOTS_LIMIT`].
    pub recent: Vec<SnapshotSummary>,
}

pub const TOP_SOURCES_LIMIT: i64 = 10;
pub const RECENT_SNAPSHOTS_LIMIT: i64 = 5;

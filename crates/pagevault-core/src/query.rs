//! Pagination and filter inputs for the history and search read paths.
//!
//! Optional filters are lenient: malformed or meaningless values collapse
//! to "filter absent" instead of producing an error.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::snapshot::{PageSnapshot, Product};

pub const DEFAULT_HISTORY_PER_PAGE: u32 = 10;
pub const DEFAULT_SEARCH_PER_PAGE: u32 = 20;

/// Upper bound for "latest N snapshots of a URL" lookups.
pub const MAX_LATEST_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// 1-based; the constructors never produce 0.
    page: u32,
    per_page: u32,
}

impl Pagination {
    /// Builds a pagination window, replacing missing or non-positive values
    /// with page 1 and `default_per_page`.
    #[must_use]
    pub fn new(page: Option<i64>, per_page: Option<i64>, default_per_page: u32) -> Self {
        Self {
            page: positive_u32(page).unwrap_or(1),
            per_page: positive_u32(per_page).unwrap_or(default_per_page.max(1)),
        }
    }

    #[must_use]
    pub fn history(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self::new(page, per_page, DEFAULT_HISTORY_PER_PAGE)
    }

    #[must_use]
    pub fn search(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self::new(page, per_page, DEFAULT_SEARCH_PER_PAGE)
    }

    /// Caps `per_page` at `max`.
    #[must_use]
    pub fn capped(self, max: u32) -> Self {
        Self {
            per_page: self.per_page.min(max.max(1)),
            ..self
        }
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

fn positive_u32(value: Option<i64>) -> Option<u32> {
    value
        .filter(|v| *v >= 1)
        .and_then(|v| u32::try_from(v).ok())
}

/// Parses an RFC 3339 bound, returning `None` for anything malformed.
#[must_use]
pub fn parse_date_bound(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

/// Filters for a URL's scrape history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryFilters {
    /// Keep snapshots owning at least one product from this source.
    pub source: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub date_to: Option<DateTime<Utc>>,
    pub success_only: bool,
}

impl HistoryFilters {
    /// Builds filters from raw query-string values. Blank sources and
    /// unparseable dates are dropped.
    #[must_use]
    pub fn from_raw(
        source: Option<&str>,
        date_from: Option<&str>,
        date_to: Option<&str>,
        success_only: bool,
    ) -> Self {
        Self {
            source: non_blank(source),
            date_from: date_from.and_then(parse_date_bound),
            date_to: date_to.and_then(parse_date_bound),
            success_only,
        }
    }
}

/// Filters for product search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(with = "rust_decimal::serde::float_option")]
    pub min_price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub max_price: Option<Decimal>,
    pub source: Option<String>,
    /// Keep only products with a discount greater than zero.
    pub with_discount: bool,
}

impl SearchFilters {
    #[must_use]
    pub fn from_raw(
        min_price: Option<Decimal>,
        max_price: Option<Decimal>,
        source: Option<&str>,
        with_discount: bool,
    ) -> Self {
        Self {
            min_price,
            max_price,
            source: non_blank(source),
            with_discount,
        }
    }

    /// Effective lower bound. Zero (or less) means unbounded, so a price
    /// floor of exactly zero cannot be expressed.
    #[must_use]
    pub fn price_floor(&self) -> Option<Decimal> {
        self.min_price.filter(|p| *p > Decimal::ZERO)
    }

    /// Effective upper bound; zero (or less) means unbounded.
    #[must_use]
    pub fn price_ceiling(&self) -> Option<Decimal> {
        self.max_price.filter(|p| *p > Decimal::ZERO)
    }
}

/// Escapes `LIKE` metacharacters and wraps `query` for a case-insensitive
/// substring match against lower-cased columns.
#[must_use]
pub fn substring_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.trim().to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// One page of a URL's scrape history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub url: String,
    pub items: Vec<PageSnapshot>,
    /// Matching snapshots across all pages.
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub filters: HistoryFilters,
}

/// One page of product search results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub query: String,
    pub items: Vec<Product>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub filters: SearchFilters,
}

//! Page snapshots and the products observed on them.
//!
//! `New*` types are what the crawler submits; [`PageSnapshot`] and
//! [`Product`] are what the store hands back. Field names serialize in
//! camelCase to match the crawler's wire format.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::{value::RawValue, Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Structural summary of the scraped page, reported by the crawler.
///
/// Opaque to the store: whatever JSON the crawler sends is written to JSONB
/// and handed back unchanged. The accessors read the keys the crawler
/// conventionally fills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageSignals(Value);

impl PageSignals {
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn has_structured_data(&self) -> Option<bool> {
        self.0.get("hasStructuredData").and_then(Value::as_bool)
    }

    #[must_use]
    pub fn price_elements(&self) -> Option<i64> {
        self.0.get("priceElements").and_then(Value::as_i64)
    }

    #[must_use]
    pub fn product_elements(&self) -> Option<i64> {
        self.0.get("productElements").and_then(Value::as_i64)
    }
}

impl Default for PageSignals {
    fn default() -> Self {
        Self(Value::Object(Map::new()))
    }
}

impl From<Value> for PageSignals {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Point-in-time product summary computed by the crawler at ingest time.
///
/// Stored verbatim like [`PageSignals`]; the store never recomputes it from
/// product rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stats(Value);

impl Stats {
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn total_products(&self) -> Option<i64> {
        self.0.get("totalProducts").and_then(Value::as_i64)
    }

    #[must_use]
    pub fn with_discount(&self) -> Option<i64> {
        self.0.get("withDiscount").and_then(Value::as_i64)
    }

    #[must_use]
    pub fn with_weight(&self) -> Option<i64> {
        self.0.get("withWeight").and_then(Value::as_i64)
    }

    #[must_use]
    pub fn min_price(&self) -> Option<f64> {
        self.0.get("minPrice").and_then(Value::as_f64)
    }

    #[must_use]
    pub fn avg_price(&self) -> Option<f64> {
        self.0.get("avgPrice").and_then(Value::as_f64)
    }

    #[must_use]
    pub fn max_price(&self) -> Option<f64> {
        self.0.get("maxPrice").and_then(Value::as_f64)
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self(Value::Object(Map::new()))
    }
}

impl From<Value> for Stats {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// A product as submitted by the crawler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    /// Canonical product page URL; the dedup key across all snapshots.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: String,
    /// Bound to `NUMERIC(10,2)`, so values are rounded to cents on write.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub old_price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub discount: Option<Decimal>,
    /// Accepts a JSON number or a string; kept as text so `"1.5 kg"` survives.
    #[serde(default, deserialize_with = "deserialize_weight")]
    pub weight: Option<String>,
    #[serde(default)]
    pub unit: String,
    /// Marketplace or site label, e.g. `"ozon"`.
    #[serde(default)]
    pub source: String,
    /// Raw text of the matched element, kept for diagnostics and search.
    #[serde(default)]
    pub element_text: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub page_title: String,
    #[serde(default)]
    pub page_url: String,
    /// When the crawler observed this product, if it reports one.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// One scrape event as submitted by the crawler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPageSnapshot {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub page_title: String,
    #[serde(default)]
    pub page_info: PageSignals,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default = "default_success")]
    pub success: bool,
    /// Free-form timestamp string from the crawler, stored verbatim.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub products: Vec<NewProduct>,
}

fn default_success() -> bool {
    true
}

/// Rejections for a submitted snapshot. These are the caller's fault and
/// are never worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("url is required")]
    MissingUrl,
    #[error("at least one product is required")]
    NoProducts,
    #[error("product #{index} has no url")]
    MissingProductUrl { index: usize },
    #[error("product #{index} has a negative price")]
    NegativePrice { index: usize },
}

impl NewPageSnapshot {
    /// Fills the fields the crawler is allowed to omit.
    ///
    /// - empty `timestamp` becomes `now` in RFC 3339
    /// - empty `user_agent` becomes `fallback_user_agent` when given
    /// - each product's empty `page_title` / `page_url` is copied from the page
    pub fn apply_defaults(&mut self, now: DateTime<Utc>, fallback_user_agent: Option<&str>) {
        if self.timestamp.trim().is_empty() {
            self.timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        }

        if self.user_agent.trim().is_empty() {
            if let Some(ua) = fallback_user_agent {
                self.user_agent = ua.to_string();
            }
        }

        for product in &mut self.products {
            if product.page_title.is_empty() {
                product.page_title.clone_from(&self.page_title);
            }
            if product.page_url.is_empty() {
                product.page_url.clone_from(&self.url);
            }
        }
    }

    /// Checks the preconditions for ingest.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, checking the page first
    /// and then each product in input order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.trim().is_empty() {
            return Err(ValidationError::MissingUrl);
        }
        if self.products.is_empty() {
            return Err(ValidationError::NoProducts);
        }
        for (index, product) in self.products.iter().enumerate() {
            if product.url.trim().is_empty() {
                return Err(ValidationError::MissingProductUrl { index });
            }
            if product.price < Decimal::ZERO {
                return Err(ValidationError::NegativePrice { index });
            }
        }
        Ok(())
    }
}

/// A stored product, deduplicated by `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    /// Snapshot that most recently wrote this product.
    pub snapshot_id: Uuid,
    pub url: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub old_price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub discount: Option<Decimal>,
    pub weight: Option<String>,
    pub unit: String,
    pub source: String,
    pub element_text: String,
    pub image: String,
    pub page_title: String,
    pub page_url: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored scrape event with the products it currently owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub id: Uuid,
    pub url: String,
    pub page_title: String,
    pub page_info: PageSignals,
    pub stats: Stats,
    pub success: bool,
    pub timestamp: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// In the order they were submitted by the snapshot that owns them.
    pub products: Vec<Product>,
}

/// Snapshot without its products, used in rollups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub id: Uuid,
    pub url: String,
    pub page_title: String,
    pub success: bool,
    pub timestamp: String,
    pub stats: Stats,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a successful ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub products_created: u64,
    pub products_updated: u64,
}

/// Numbers keep their literal JSON text (`1.50` stays `"1.50"`); strings are
/// trimmed. Blank values become `None`.
fn deserialize_weight<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<Box<RawValue>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let literal = raw.get().trim();
    let text = match literal.as_bytes().first() {
        Some(b'"') => serde_json::from_str::<String>(literal)
            .map_err(D::Error::custom)?
            .trim()
            .to_string(),
        Some(b'-' | b'0'..=b'9') => literal.to_string(),
        Some(b'n') if literal == "null" => return Ok(None),
        _ => return Err(D::Error::custom("weight must be a number or a string")),
    };
    Ok(Some(text).filter(|s| !s.is_empty()))
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;

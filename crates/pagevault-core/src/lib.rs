pub mod app_config;
pub mod config;
pub mod query;
pub mod snapshot;
pub mod statistics;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use query::{
    parse_date_bound, substring_pattern, HistoryFilters, HistoryPage, Pagination, SearchFilters,
    SearchPage, DEFAULT_HISTORY_PER_PAGE, DEFAULT_SEARCH_PER_PAGE, MAX_LATEST_LIMIT,
};
pub use snapshot::{
    IngestReceipt, NewPageSnapshot, NewProduct, PageSignals, PageSnapshot, Product,
    SnapshotSummary, Stats, ValidationError,
};
pub use statistics::{
    GlobalOverview, GlobalStatistics, SourceSummary, StatsPeriod, UrlStatistics,
    RECENT_SNAPSHOTS_LIMIT, TOP_SOURCES_LIMIT,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

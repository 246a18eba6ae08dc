//! Offline tests for pagevault-db pool configuration, row mapping, and the
//! error taxonomy. These tests do not require a live database connection.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use chrono::Utc;
use pagevault_core::{AppConfig, Environment, Product, ValidationError};
use pagevault_db::{DbError, Deadline, ErrorKind, PoolConfig, ProductRow};
use rust_decimal::Decimal;
use uuid::Uuid;

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        request_timeout_secs: 15,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn product_row_maps_observed_at_to_timestamp() {
    let now = Utc::now();
    let row = ProductRow {
        id: Uuid::new_v4(),
        snapshot_id: Uuid::new_v4(),
        position: 3,
        url: "https://shop.example/p/1".to_string(),
        name: "Milk 1L".to_string(),
        price: Decimal::new(8990, 2),
        old_price: Some(Decimal::new(9990, 2)),
        discount: Some(Decimal::new(10, 0)),
        weight: Some("1".to_string()),
        unit: "l".to_string(),
        source: "ozon".to_string(),
        element_text: "Milk 1L 89.90".to_string(),
        image: String::new(),
        page_title: "Dairy".to_string(),
        page_url: "https://shop.example/dairy".to_string(),
        observed_at: Some(now),
        created_at: now,
        updated_at: now,
    };
    let id = row.id;

    let product = Product::from(row);
    assert_eq!(product.id, id);
    assert_eq!(product.timestamp, Some(now));
    assert_eq!(product.price, Decimal::new(8990, 2));
    assert_eq!(product.source, "ozon");
}

#[test]
fn error_kind_taxonomy() {
    let cases = [
        (
            DbError::from(ValidationError::MissingUrl),
            ErrorKind::Validation,
        ),
        (DbError::NotFound, ErrorKind::NotFound),
        (DbError::DeadlineExceeded, ErrorKind::Storage),
        (DbError::from(sqlx::Error::PoolClosed), ErrorKind::Storage),
    ];

    for (error, expected) in cases {
        assert_eq!(error.kind(), expected, "unexpected kind for {error}");
    }
}

#[test]
fn validation_error_message_is_preserved() {
    let error = DbError::from(ValidationError::MissingProductUrl { index: 2 });
    assert_eq!(error.to_string(), "product #2 has no url");
}

#[tokio::test]
async fn deadline_after_zero_is_expired() {
    let deadline = Deadline::after(Duration::ZERO);
    assert!(deadline.is_expired());
    assert_eq!(deadline.remaining(), Duration::ZERO);
}

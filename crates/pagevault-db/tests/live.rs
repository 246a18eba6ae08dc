//! Live integration tests for pagevault-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/pagevault-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use pagevault_core::{
    HistoryFilters, NewPageSnapshot, NewProduct, PageSignals, Pagination, SearchFilters, Stats,
    StatsPeriod, ValidationError,
};
use pagevault_db::{DbError, Deadline, Store};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(30))
}

fn price(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn make_product(url: &str, name: &str, cents: i64) -> NewProduct {
    NewProduct {
        url: url.to_string(),
        name: name.to_string(),
        price: price(cents),
        old_price: None,
        discount: None,
        weight: None,
        unit: String::new(),
        source: "ozon".to_string(),
        element_text: format!("{name} {cents}"),
        image: String::new(),
        page_title: String::new(),
        page_url: String::new(),
        timestamp: None,
    }
}

fn make_snapshot(url: &str, products: Vec<NewProduct>) -> NewPageSnapshot {
    let mut snapshot = NewPageSnapshot {
        url: url.to_string(),
        page_title: "Catalog".to_string(),
        page_info: PageSignals::from(json!({
            "hasStructuredData": true,
            "priceElements": 12,
            "productElements": 4,
            "totalElements": 380
        })),
        stats: Stats::from(json!({ "totalProducts": products.len() })),
        success: true,
        timestamp: String::new(),
        user_agent: "live-test".to_string(),
        products,
    };
    snapshot.apply_defaults(Utc::now(), None);
    snapshot
}

async fn count(pool: &sqlx::PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap_or_else(|e| panic!("count {table} failed: {e}"))
}

// ---------------------------------------------------------------------------
// Section 1: Ingest
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn zero_product_ingest_is_rejected_and_persists_nothing(pool: sqlx::PgPool) {
    let store = Store::new(pool.clone());
    let snapshot = make_snapshot("https://shop.example/empty", vec![]);

    let err = store
        .ingest(&snapshot, deadline())
        .await
        .expect_err("empty product list must be rejected");

    assert!(matches!(
        err,
        DbError::Validation(ValidationError::NoProducts)
    ));
    assert_eq!(count(&pool, "page_snapshots").await, 0);
    assert_eq!(count(&pool, "products").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn reingest_of_known_product_url_updates_in_place(pool: sqlx::PgPool) {
    let store = Store::new(pool.clone());
    let page = "https://shop.example/dairy";
    let product_url = "https://shop.example/p/milk";

    let first = store
        .ingest(
            &make_snapshot(page, vec![make_product(product_url, "Milk", 999)]),
            deadline(),
        )
        .await
        .expect("first ingest");
    assert_eq!(first.products_created, 1);
    assert_eq!(first.products_updated, 0);

    let original = store
        .product_by_url(product_url, deadline())
        .await
        .expect("product after first ingest");

    let second = store
        .ingest(
            &make_snapshot(page, vec![make_product(product_url, "Milk 2.5%", 799)]),
            deadline(),
        )
        .await
        .expect("second ingest");
    assert_eq!(second.products_created, 0);
    assert_eq!(second.products_updated, 1);
    assert_ne!(first.id, second.id);

    let updated = store
        .product_by_url(product_url, deadline())
        .await
        .expect("product after second ingest");

    assert_eq!(updated.id, original.id, "id must survive the upsert");
    assert_eq!(updated.created_at, original.created_at);
    assert_eq!(updated.price, price(799));
    assert_eq!(updated.name, "Milk 2.5%");
    assert_eq!(updated.snapshot_id, second.id);
    assert_eq!(count(&pool, "products").await, 1);
    assert_eq!(count(&pool, "page_snapshots").await, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn failure_on_later_product_rolls_back_whole_ingest(pool: sqlx::PgPool) {
    sqlx::query(
        "CREATE FUNCTION reject_poison() RETURNS trigger AS $$ \
         BEGIN \
             IF NEW.name = 'poison' THEN RAISE EXCEPTION 'poisoned product'; END IF; \
             RETURN NEW; \
         END; $$ LANGUAGE plpgsql",
    )
    .execute(&pool)
    .await
    .expect("create trigger function");
    sqlx::query(
        "CREATE TRIGGER products_reject_poison BEFORE INSERT ON products \
         FOR EACH ROW EXECUTE FUNCTION reject_poison()",
    )
    .execute(&pool)
    .await
    .expect("create trigger");

    let store = Store::new(pool.clone());
    let snapshot = make_snapshot(
        "https://shop.example/mixed",
        vec![
            make_product("https://shop.example/p/good", "Bread", 150),
            make_product("https://shop.example/p/bad", "poison", 100),
        ],
    );

    let err = store
        .ingest(&snapshot, deadline())
        .await
        .expect_err("trigger must abort the ingest");

    assert!(matches!(err, DbError::Sqlx(_)), "got {err:?}");
    assert_eq!(count(&pool, "page_snapshots").await, 0);
    assert_eq!(count(&pool, "products").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_ingests_of_same_product_url_keep_one_row(pool: sqlx::PgPool) {
    let store = Store::new(pool.clone());
    let product_url = "https://shop.example/p/shared";
    let a = make_snapshot(
        "https://shop.example/a",
        vec![make_product(product_url, "Shared", 500)],
    );
    let b = make_snapshot(
        "https://shop.example/b",
        vec![make_product(product_url, "Shared", 550)],
    );

    let (ra, rb) = tokio::join!(store.ingest(&a, deadline()), store.ingest(&b, deadline()));
    let ra = ra.expect("ingest a");
    let rb = rb.expect("ingest b");

    assert_eq!(ra.products_created + rb.products_created, 1);
    assert_eq!(ra.products_updated + rb.products_updated, 1);
    assert_eq!(count(&pool, "products").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn expired_deadline_persists_nothing(pool: sqlx::PgPool) {
    let store = Store::new(pool.clone());
    let snapshot = make_snapshot(
        "https://shop.example/late",
        vec![make_product("https://shop.example/p/late", "Late", 100)],
    );

    let err = store
        .ingest(&snapshot, Deadline::after(Duration::ZERO))
        .await
        .expect_err("expired deadline must fail");

    assert!(matches!(err, DbError::DeadlineExceeded));
    assert_eq!(count(&pool, "page_snapshots").await, 0);
}

async fn install_slow_product_trigger(pool: &sqlx::PgPool, seconds: f64) {
    sqlx::query(&format!(
        "CREATE FUNCTION slow_product_insert() RETURNS trigger AS $$ \
         BEGIN PERFORM pg_sleep({seconds}); RETURN NEW; END; $$ LANGUAGE plpgsql"
    ))
    .execute(pool)
    .await
    .expect("create trigger function");
    sqlx::query(
        "CREATE TRIGGER products_slow_insert BEFORE INSERT ON products \
         FOR EACH ROW EXECUTE FUNCTION slow_product_insert()",
    )
    .execute(pool)
    .await
    .expect("create trigger");
}

#[sqlx::test(migrations = "../../migrations")]
async fn deadline_expiring_mid_ingest_rolls_back(pool: sqlx::PgPool) {
    install_slow_product_trigger(&pool, 1.0).await;
    let store = Store::new(pool.clone());
    let snapshot = make_snapshot(
        "https://shop.example/slow",
        vec![make_product("https://shop.example/p/slow", "Slow", 100)],
    );

    let err = store
        .ingest(&snapshot, Deadline::after(Duration::from_millis(300)))
        .await
        .expect_err("deadline must cut the ingest off");
    assert!(matches!(err, DbError::DeadlineExceeded), "got {err:?}");

    // Let the abandoned statement finish on the server before counting.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(count(&pool, "page_snapshots").await, 0);
    assert_eq!(count(&pool, "products").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn crosswise_concurrent_ingests_both_succeed(pool: sqlx::PgPool) {
    install_slow_product_trigger(&pool, 0.2).await;
    let store = Store::new(pool.clone());
    let first = "https://shop.example/p/first";
    let second = "https://shop.example/p/second";
    let forward = make_snapshot(
        "https://shop.example/forward",
        vec![
            make_product(first, "First", 100),
            make_product(second, "Second", 200),
        ],
    );
    let backward = make_snapshot(
        "https://shop.example/backward",
        vec![
            make_product(second, "Second", 210),
            make_product(first, "First", 110),
        ],
    );

    let (rf, rb) = tokio::join!(
        store.ingest(&forward, deadline()),
        store.ingest(&backward, deadline())
    );
    let rf = rf.expect("forward ingest");
    let rb = rb.expect("backward ingest");

    assert_eq!(rf.products_created + rb.products_created, 2);
    assert_eq!(rf.products_updated + rb.products_updated, 2);
    assert_eq!(count(&pool, "page_snapshots").await, 2);
    assert_eq!(count(&pool, "products").await, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn unnamed_product_is_stored(pool: sqlx::PgPool) {
    let store = Store::new(pool.clone());
    let snapshot = make_snapshot(
        "https://shop.example/p",
        vec![make_product("https://shop.example/p#1", "", 999)],
    );

    let receipt = store.ingest(&snapshot, deadline()).await.expect("ingest");
    let stored = store
        .snapshot_by_id(receipt.id, deadline())
        .await
        .expect("fetch");

    assert_eq!(stored.products.len(), 1);
    assert_eq!(stored.products[0].name, "");
}

#[sqlx::test(migrations = "../../migrations")]
async fn caller_blobs_and_weight_text_round_trip(pool: sqlx::PgPool) {
    let store = Store::new(pool);
    let mut weighed = make_product("https://shop.example/p/flour", "Flour", 250);
    weighed.weight = Some("1.50".to_string());
    let mut snapshot = make_snapshot("https://shop.example/baking", vec![weighed]);
    let stats = json!({ "totalProducts": 1, "currency": "RUB" });
    let page_info = json!({ "layout": "grid", "widgets": [{ "kind": "carousel", "items": 3 }] });
    snapshot.stats = Stats::from(stats.clone());
    snapshot.page_info = PageSignals::from(page_info.clone());

    let receipt = store.ingest(&snapshot, deadline()).await.expect("ingest");
    let stored = store
        .snapshot_by_id(receipt.id, deadline())
        .await
        .expect("fetch");

    assert_eq!(stored.stats.as_value(), &stats);
    assert_eq!(stored.page_info.as_value(), &page_info);
    assert_eq!(stored.products[0].weight.as_deref(), Some("1.50"));
}

// ---------------------------------------------------------------------------
// Section 2: Point reads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn snapshot_by_id_returns_products_in_submitted_order(pool: sqlx::PgPool) {
    let store = Store::new(pool);
    let snapshot = make_snapshot(
        "https://shop.example/order",
        vec![
            make_product("https://shop.example/p/z", "Zucchini", 300),
            make_product("https://shop.example/p/a", "Apple", 100),
            make_product("https://shop.example/p/m", "Mango", 200),
        ],
    );
    let receipt = store.ingest(&snapshot, deadline()).await.expect("ingest");

    let fetched = store
        .snapshot_by_id(receipt.id, deadline())
        .await
        .expect("snapshot by id");

    let names: Vec<&str> = fetched.products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Zucchini", "Apple", "Mango"]);
    assert_eq!(fetched.page_info, snapshot.page_info);
    assert_eq!(fetched.stats, snapshot.stats);
    assert_eq!(fetched.timestamp, snapshot.timestamp);
    assert_eq!(fetched.products[0].page_url, "https://shop.example/order");
}

#[sqlx::test(migrations = "../../migrations")]
async fn unknown_ids_and_urls_are_not_found(pool: sqlx::PgPool) {
    let store = Store::new(pool);

    assert!(matches!(
        store.snapshot_by_id(Uuid::new_v4(), deadline()).await,
        Err(DbError::NotFound)
    ));
    assert!(matches!(
        store.latest_by_url("https://nowhere.example", deadline()).await,
        Err(DbError::NotFound)
    ));
    assert!(matches!(
        store
            .latest_n_by_url("https://nowhere.example", 5, deadline())
            .await,
        Err(DbError::NotFound)
    ));
    assert!(matches!(
        store.product_by_id(Uuid::new_v4(), deadline()).await,
        Err(DbError::NotFound)
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn latest_snapshots_are_newest_first(pool: sqlx::PgPool) {
    let store = Store::new(pool);
    let page = "https://shop.example/latest";
    let mut ids = Vec::new();
    for i in 0..3 {
        let receipt = store
            .ingest(
                &make_snapshot(
                    page,
                    vec![make_product(&format!("https://shop.example/p/l{i}"), "Item", 100)],
                ),
                deadline(),
            )
            .await
            .expect("ingest");
        ids.push(receipt.id);
    }

    let latest = store.latest_by_url(page, deadline()).await.expect("latest");
    assert_eq!(latest.id, ids[2]);

    let two = store
        .latest_n_by_url(page, 2, deadline())
        .await
        .expect("latest two");
    assert_eq!(two.iter().map(|s| s.id).collect::<Vec<_>>(), [ids[2], ids[1]]);

    let clamped = store
        .latest_n_by_url(page, 0, deadline())
        .await
        .expect("limit 0 clamps to 1");
    assert_eq!(clamped.len(), 1);
}

// ---------------------------------------------------------------------------
// Section 3: History
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn history_pages_cover_every_snapshot_exactly_once(pool: sqlx::PgPool) {
    let store = Store::new(pool);
    let page = "https://shop.example/history";
    for i in 0..7 {
        store
            .ingest(
                &make_snapshot(
                    page,
                    vec![make_product(&format!("https://shop.example/p/h{i}"), "Item", 100)],
                ),
                deadline(),
            )
            .await
            .expect("ingest");
    }

    let mut seen = Vec::new();
    for page_no in 1..=3 {
        let result = store
            .history(
                page,
                Pagination::history(Some(page_no), Some(3)),
                &HistoryFilters::default(),
                deadline(),
            )
            .await
            .expect("history page");
        assert_eq!(result.total, 7);
        seen.extend(result.items);
    }

    assert_eq!(seen.len(), 7);
    let distinct: HashSet<Uuid> = seen.iter().map(|s| s.id).collect();
    assert_eq!(distinct.len(), 7);
    assert!(seen
        .windows(2)
        .all(|pair| pair[0].created_at >= pair[1].created_at));
}

#[sqlx::test(migrations = "../../migrations")]
async fn history_filters_by_source_success_and_dates(pool: sqlx::PgPool) {
    let store = Store::new(pool);
    let page = "https://shop.example/filters";

    // Two products from the same source: the snapshot must appear once.
    let ozon = make_snapshot(
        page,
        vec![
            make_product("https://shop.example/p/o1", "One", 100),
            make_product("https://shop.example/p/o2", "Two", 200),
        ],
    );
    store.ingest(&ozon, deadline()).await.expect("ingest ozon");

    let mut wb = make_snapshot(
        page,
        vec![make_product("https://shop.example/p/w1", "Three", 300)],
    );
    wb.products[0].source = "wb".to_string();
    wb.success = false;
    store.ingest(&wb, deadline()).await.expect("ingest wb");

    let by_source = store
        .history(
            page,
            Pagination::history(None, None),
            &HistoryFilters::from_raw(Some("ozon"), None, None, false),
            deadline(),
        )
        .await
        .expect("history by source");
    assert_eq!(by_source.total, 1);
    assert_eq!(by_source.items.len(), 1);

    let successful = store
        .history(
            page,
            Pagination::history(None, None),
            &HistoryFilters::from_raw(None, None, None, true),
            deadline(),
        )
        .await
        .expect("history success only");
    assert_eq!(successful.total, 1);
    assert!(successful.items[0].success);

    let garbage_dates = store
        .history(
            page,
            Pagination::history(None, None),
            &HistoryFilters::from_raw(None, Some("yesterday"), Some("soon"), false),
            deadline(),
        )
        .await
        .expect("history with malformed dates");
    assert_eq!(garbage_dates.total, 2);

    let future_from = (Utc::now() + chrono::Duration::days(1)).to_rfc3339();
    let none_yet = store
        .history(
            page,
            Pagination::history(None, None),
            &HistoryFilters::from_raw(None, Some(future_from.as_str()), None, false),
            deadline(),
        )
        .await
        .expect("history from the future");
    assert_eq!(none_yet.total, 0);
    assert!(none_yet.items.is_empty());
}

// ---------------------------------------------------------------------------
// Section 4: Search
// ---------------------------------------------------------------------------

async fn seed_search_catalog(store: &Store) {
    let mut discounted = make_product("https://shop.example/p/s15", "Oat milk", 1500);
    discounted.discount = Some(Decimal::new(20, 0));
    discounted.source = "wb".to_string();

    store
        .ingest(
            &make_snapshot(
                "https://shop.example/search",
                vec![
                    make_product("https://shop.example/p/s5", "Goat MILK", 500),
                    make_product("https://shop.example/p/s10", "Cow milk", 1000),
                    discounted,
                    make_product("https://shop.example/p/pct", "Cream 50% fat", 700),
                ],
            ),
            deadline(),
        )
        .await
        .expect("seed search catalog");
}

#[sqlx::test(migrations = "../../migrations")]
async fn search_price_bounds_treat_zero_as_unbounded(pool: sqlx::PgPool) {
    let store = Store::new(pool);
    seed_search_catalog(&store).await;

    let unbounded = store
        .search_products(
            "milk",
            Pagination::search(None, None),
            &SearchFilters::default(),
            deadline(),
        )
        .await
        .expect("unbounded search");
    assert_eq!(unbounded.total, 3);

    let zero_floor = store
        .search_products(
            "milk",
            Pagination::search(None, None),
            &SearchFilters::from_raw(Some(Decimal::ZERO), None, None, false),
            deadline(),
        )
        .await
        .expect("zero floor search");
    assert_eq!(zero_floor.total, unbounded.total);

    let exactly_ten = store
        .search_products(
            "milk",
            Pagination::search(None, None),
            &SearchFilters::from_raw(Some(Decimal::TEN), Some(Decimal::TEN), None, false),
            deadline(),
        )
        .await
        .expect("exact price search");
    assert_eq!(exactly_ten.total, 1);
    assert_eq!(exactly_ten.items[0].price, Decimal::TEN);
}

#[sqlx::test(migrations = "../../migrations")]
async fn search_filters_by_source_discount_and_literal_pattern(pool: sqlx::PgPool) {
    let store = Store::new(pool);
    seed_search_catalog(&store).await;

    let discounted = store
        .search_products(
            "MILK",
            Pagination::search(None, None),
            &SearchFilters::from_raw(None, None, None, true),
            deadline(),
        )
        .await
        .expect("discount search");
    assert_eq!(discounted.total, 1);
    assert_eq!(discounted.items[0].name, "Oat milk");

    let by_source = store
        .search_products(
            "milk",
            Pagination::search(None, None),
            &SearchFilters::from_raw(None, None, Some("ozon"), false),
            deadline(),
        )
        .await
        .expect("source search");
    assert_eq!(by_source.total, 2);

    let literal = store
        .search_products(
            "50%",
            Pagination::search(None, None),
            &SearchFilters::default(),
            deadline(),
        )
        .await
        .expect("literal percent search");
    assert_eq!(literal.total, 1);
    assert_eq!(literal.items[0].name, "Cream 50% fat");

    let nothing = store
        .search_products(
            "caviar",
            Pagination::search(None, None),
            &SearchFilters::default(),
            deadline(),
        )
        .await
        .expect("empty search");
    assert_eq!(nothing.total, 0);
    assert!(nothing.items.is_empty());
}

// ---------------------------------------------------------------------------
// Section 5: Statistics
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn url_statistics_for_unknown_url_are_zero(pool: sqlx::PgPool) {
    let store = Store::new(pool);

    let stats = store
        .url_statistics("https://nowhere.example", StatsPeriod::parse(None), deadline())
        .await
        .expect("stats for empty url");

    assert_eq!(stats.period, StatsPeriod::Rolling30Days);
    assert_eq!(stats.total_scrapes, 0);
    assert_eq!(stats.successful_scrapes, 0);
    assert!(stats.first_scraped_at.is_none());
    assert!(stats.last_stats.is_none());
    assert_eq!(stats.total_products, 0);
    assert_eq!(stats.min_price, Decimal::ZERO);
    assert_eq!(stats.avg_price, Decimal::ZERO);
    assert_eq!(stats.max_price, Decimal::ZERO);
}

#[sqlx::test(migrations = "../../migrations")]
async fn url_statistics_roll_up_in_window_snapshots(pool: sqlx::PgPool) {
    let store = Store::new(pool);
    let page = "https://shop.example/stats";

    store
        .ingest(
            &make_snapshot(
                page,
                vec![
                    make_product("https://shop.example/p/a", "A", 500),
                    make_product("https://shop.example/p/b", "B", 1000),
                ],
            ),
            deadline(),
        )
        .await
        .expect("first ingest");

    let mut failed = make_snapshot(
        page,
        vec![make_product("https://shop.example/p/c", "C", 1500)],
    );
    failed.success = false;
    failed.stats = Stats::from(json!({ "totalProducts": 1, "maxPrice": 15.0 }));
    store.ingest(&failed, deadline()).await.expect("second ingest");

    let stats = store
        .url_statistics(page, StatsPeriod::Day, deadline())
        .await
        .expect("url stats");

    assert_eq!(stats.total_scrapes, 2);
    assert_eq!(stats.successful_scrapes, 1);
    assert_eq!(stats.total_products, 3);
    assert_eq!(stats.unique_products, 3);
    assert_eq!(stats.min_price, Decimal::new(5, 0));
    assert_eq!(stats.avg_price, Decimal::new(10, 0));
    assert_eq!(stats.max_price, Decimal::new(15, 0));
    assert_eq!(stats.last_stats, Some(failed.stats));
    assert!(stats.first_scraped_at <= stats.last_scraped_at);
}

#[sqlx::test(migrations = "../../migrations")]
async fn global_statistics_on_empty_store_are_zero(pool: sqlx::PgPool) {
    let store = Store::new(pool);

    let stats = store
        .global_statistics(deadline())
        .await
        .expect("global stats");

    assert_eq!(stats.overview.total_scrapes, 0);
    assert_eq!(stats.overview.total_products, 0);
    assert_eq!(stats.overview.avg_price, Decimal::ZERO);
    assert!(stats.top_sources.is_empty());
    assert!(stats.recent.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn global_statistics_rank_sources_and_list_recent(pool: sqlx::PgPool) {
    let store = Store::new(pool);
    seed_search_catalog(&store).await;
    store
        .ingest(
            &make_snapshot(
                "https://shop.example/other",
                vec![make_product("https://shop.example/p/x", "Bread", 200)],
            ),
            deadline(),
        )
        .await
        .expect("second page");

    let stats = store
        .global_statistics(deadline())
        .await
        .expect("global stats");

    assert_eq!(stats.overview.total_scrapes, 2);
    assert_eq!(stats.overview.unique_urls, 2);
    assert_eq!(stats.overview.last_24_hours, 2);
    assert_eq!(stats.overview.total_products, 5);
    assert_eq!(stats.top_sources[0].source, "ozon");
    assert_eq!(stats.top_sources[0].product_count, 4);
    assert_eq!(stats.top_sources[1].source, "wb");
    assert_eq!(stats.recent.len(), 2);
    assert_eq!(stats.recent[0].url, "https://shop.example/other");
}

// ---------------------------------------------------------------------------
// Section 6: Delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn delete_removes_only_currently_owned_products(pool: sqlx::PgPool) {
    let store = Store::new(pool.clone());
    let page = "https://shop.example/delete";

    let older = store
        .ingest(
            &make_snapshot(
                page,
                vec![
                    make_product("https://shop.example/p/only-old", "Old", 100),
                    make_product("https://shop.example/p/shared", "Shared", 200),
                ],
            ),
            deadline(),
        )
        .await
        .expect("older ingest");
    let newer = store
        .ingest(
            &make_snapshot(
                page,
                vec![make_product("https://shop.example/p/shared", "Shared", 250)],
            ),
            deadline(),
        )
        .await
        .expect("newer ingest");

    store
        .delete_snapshot(older.id, deadline())
        .await
        .expect("delete older");

    assert!(matches!(
        store.snapshot_by_id(older.id, deadline()).await,
        Err(DbError::NotFound)
    ));
    assert!(matches!(
        store
            .product_by_url("https://shop.example/p/only-old", deadline())
            .await,
        Err(DbError::NotFound)
    ));
    let shared = store
        .product_by_url("https://shop.example/p/shared", deadline())
        .await
        .expect("shared product survives");
    assert_eq!(shared.snapshot_id, newer.id);

    assert!(matches!(
        store.delete_snapshot(older.id, deadline()).await,
        Err(DbError::NotFound)
    ));
}

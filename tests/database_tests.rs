// Integration tests for price history and the market cache

mod common;

use common::{asset, create_temp_db_dir, create_test_config};
use market_sync::core::asset_list;
use market_sync::{Database, PriceHistory, StateCache, SyncError, Tab};

#[test]
fn test_database_creation() {
    let (_temp_dir, db_path) = create_temp_db_dir();

    let db = Database::open_and_migrate(&db_path).expect("Failed to create database");
    assert!(db_path.exists());
    assert!(db.health_check().unwrap());
}

#[test]
fn test_nested_path_is_created() {
    let (temp_dir, _) = create_temp_db_dir();
    let nested = temp_dir.path().join("data").join("tabs").join("sync.db");

    Database::open_and_migrate(&nested).expect("Failed to create nested database");
    assert!(nested.exists());
}

#[test]
fn test_unusable_path_reports_degraded_storage() {
    let (temp_dir, _) = create_temp_db_dir();
    let blocker = temp_dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"plain file").unwrap();

    let err = Database::open_and_migrate(blocker.join("sync.db")).unwrap_err();
    assert!(matches!(err, SyncError::StorageConnection(_)));
    assert_eq!(err.category(), "storage");
    assert!(!err.is_retryable());
    assert!(err.user_message().contains("Price history and warm start are disabled"));
}

#[test]
fn test_history_survives_reopen() {
    let (_temp_dir, db_path) = create_temp_db_dir();

    {
        let db = Database::open_and_migrate(&db_path).unwrap();
        let history = PriceHistory::new(db, 5);
        for i in 0..8 {
            history.save("btcusdt", 60_000.0 + i as f64).unwrap();
        }
    }

    let db = Database::open_and_migrate(&db_path).unwrap();
    let history = PriceHistory::new(db, 5);
    let points = history.load_recent("btcusdt", 20).unwrap();

    let prices: Vec<f64> = points.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![60_003.0, 60_004.0, 60_005.0, 60_006.0, 60_007.0]);
    assert!(points.iter().all(|p| p.symbol == "btcusdt" && !p.recorded_at.is_empty()));
}

#[test]
fn test_history_is_kept_per_symbol() {
    let db = Database::new_in_memory().unwrap();
    db.run_migrations().unwrap();
    let history = PriceHistory::new(db, 2);

    history.save("btcusdt", 1.0).unwrap();
    history.save("ethusdt", 2.0).unwrap();
    history.save("btcusdt", 3.0).unwrap();
    history.save("btcusdt", 4.0).unwrap();

    assert_eq!(history.load_recent("btcusdt", 10).unwrap().len(), 2);
    assert_eq!(history.load_recent("ethusdt", 10).unwrap().len(), 1);
    assert!(history.load_recent("solusdt", 10).unwrap().is_empty());
}

#[test]
fn test_market_cache_overwrites_previous_list() {
    let (_temp_dir, db_path) = create_temp_db_dir();
    let cache = StateCache::new(Database::open_and_migrate(&db_path).unwrap());
    assert!(cache.load_assets().unwrap().is_none());

    cache.save_assets(&asset_list(vec![asset("BTC", 1.0, 0.0)])).unwrap();
    cache
        .save_assets(&asset_list(vec![asset("ETH", 2.0, 0.0), asset("SOL", 3.0, 0.0)]))
        .unwrap();

    let cached = cache.load_assets().unwrap().unwrap();
    assert_eq!(cached.len(), 2);
    assert_eq!(cached[0].symbol, "ETH");
}

#[tokio::test]
async fn test_tab_warm_starts_from_cached_markets() {
    let (_temp_dir, db_path) = create_temp_db_dir();
    let db = Database::open_and_migrate(&db_path).unwrap();
    StateCache::new(db.clone())
        .save_assets(&asset_list(vec![asset("BTC", 64_000.0, 6.0), asset("ETH", 3_100.0, 6.0)]))
        .unwrap();

    let config = create_test_config();
    let tab = Tab::launch(&config, None, Some(db)).await.unwrap();

    let state = tab.state();
    assert!(!state.loading);
    assert_eq!(state.assets.len(), 2);
    assert_eq!(state.assets[1].price, 3_100.0);

    tab.close().await;
}

#[tokio::test]
async fn test_tab_without_cache_starts_loading() {
    let (_temp_dir, db_path) = create_temp_db_dir();
    let db = Database::open_and_migrate(&db_path).unwrap();

    let mut config = create_test_config();
    config.storage.cache_markets = false;
    StateCache::new(db.clone())
        .save_assets(&asset_list(vec![asset("BTC", 64_000.0, 6.0)]))
        .unwrap();

    let tab = Tab::launch(&config, None, Some(db)).await.unwrap();
    assert!(tab.state().loading);
    assert!(tab.state().assets.is_empty());

    tab.close().await;
}

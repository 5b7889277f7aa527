// Common test utilities and helpers
#![allow(dead_code)]

use market_sync::core::asset_list;
use market_sync::{Asset, AssetList, Config};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Test configuration: no upstream feed, short election window
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.feed.enabled = false;
    config.feed.symbols = vec!["btcusdt".to_string(), "ethusdt".to_string(), "solusdt".to_string()];
    config.election.claim_delay_ms = 50;
    config.election.bus_capacity = 64;
    config.storage.history_len = 5;
    config.logging.enable_election_logging = false;
    config
}

/// Create a temporary directory for test databases
pub fn create_temp_db_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");
    (temp_dir, db_path)
}

pub fn asset(symbol: &str, price: f64, change24h: f64) -> Asset {
    Asset {
        id: symbol.to_lowercase(),
        symbol: symbol.to_string(),
        name: symbol.to_string(),
        price,
        change24h,
        change7d: change24h,
        market_cap: price * 1_000_000.0,
        volume24h: price * 10_000.0,
        high24h: price * 1.05,
        low24h: price * 0.95,
        rank: 1,
        ..Default::default()
    }
}

/// `count` synthetic assets (SYM0, SYM1, ...) sharing one 24h change
pub fn uniform_market(count: usize, change24h: f64) -> AssetList {
    asset_list(
        (0..count)
            .map(|i| asset(&format!("SYM{}", i), 100.0 + i as f64, change24h))
            .collect(),
    )
}

/// Generate random 24h changes within +/- `spread`
pub fn generate_test_changes(count: usize, spread: f64, seed: u64) -> Vec<f64> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.gen_range(-spread..spread)).collect()
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// Stored price history
use market_sync::{Config, Database, PriceHistory, SyncResult};
use tracing::{info, warn};

pub fn show_history(config: &Config, symbol: &str, count: usize) -> SyncResult<()> {
    let db = Database::open_and_migrate(&config.storage.db_path)?;
    let history = PriceHistory::new(db, config.storage.history_len);
    let points = history.load_recent(symbol, count)?;

    if points.is_empty() {
        warn!("📭 No stored prices for {}", symbol);
        if !config.storage.tracked_symbols.iter().any(|s| s == symbol) {
            info!("💡 {} is not in storage.tracked_symbols", symbol);
        }
        return Ok(());
    }

    info!("📜 Last {} prices for {}", points.len(), symbol);
    let first = points[0].price;
    for point in &points {
        let change = if first != 0.0 { (point.price - first) / first * 100.0 } else { 0.0 };
        info!("   {}  {:>14.4}  {:+.2}%", point.recorded_at, point.price, change);
    }

    Ok(())
}

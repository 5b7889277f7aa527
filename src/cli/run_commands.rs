// Live tab commands
use market_sync::core::MarketSnapshot;
use market_sync::{Config, Database, SyncHub, SyncResult, Tab};
use std::time::Duration;
use tracing::{info, warn};

fn open_database(config: &Config) -> Option<Database> {
    match Database::open_and_migrate(&config.storage.db_path) {
        Ok(db) => Some(db),
        Err(e) => {
            warn!("⚠️  {}", e.user_message());
            None
        }
    }
}

fn log_status(tab: &Tab) {
    let state = tab.state();
    let snapshot = MarketSnapshot::from_assets(&state.assets);

    info!(
        "📊 {} | {} | tabs: {} | ws: {:?} | assets: {} | regime: {} | signal: {} | breadth: {:.0}%",
        tab.id(),
        if state.is_leader { "leader" } else { "follower" },
        state.tab_count,
        state.ws_status,
        snapshot.count,
        state.regime,
        state.signal,
        snapshot.breadth * 100.0
    );

    for symbol in ["btcusdt", "ethusdt"] {
        if let Some(price) = tab.dispatcher().prices().read(symbol) {
            info!("   💱 {} {:.2}", symbol, price);
        }
    }
    if let Some(fng) = &state.fear_greed {
        info!("   😱 Fear/Greed: {} ({})", fng.value, fng.label);
    }
    if let Some(error) = &state.error {
        warn!("   ⚠️  {}", error);
    }
}

/// One tab, live until Ctrl-C
pub async fn run_tab(config: &Config, with_bus: bool) -> SyncResult<()> {
    let hub = with_bus.then(|| SyncHub::new(config.election.bus_capacity));
    let tab = Tab::launch(config, hub.as_ref(), open_database(config)).await?;

    let mut status = tokio::time::interval(Duration::from_secs(config.logging.status_interval_secs.max(1)));
    status.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Ctrl-C received, shutting down");
                break;
            }
            _ = status.tick() => log_status(&tab),
        }
    }

    tab.close().await;
    Ok(())
}

/// Several tabs on one hub; reports the election outcome
pub async fn run_tabs(config: &Config, count: usize, secs: u64) -> SyncResult<()> {
    let hub = SyncHub::new(config.election.bus_capacity);
    let db = open_database(config);

    let mut tabs = Vec::with_capacity(count);
    for _ in 0..count.max(1) {
        tabs.push(Tab::launch(config, Some(&hub), db.clone()).await?);
    }
    info!("🪟 {} tabs on one bus ({} ports)", tabs.len(), hub.port_count());

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
        _ = tokio::signal::ctrl_c() => info!("🛑 Ctrl-C received"),
    }

    for tab in &tabs {
        log_status(tab);
    }
    let leaders = tabs.iter().filter(|tab| tab.is_leader()).count();
    if leaders == 1 {
        info!("✅ Exactly one leader");
    } else {
        warn!("⚠️  {} leaders", leaders);
    }

    for tab in tabs {
        tab.close().await;
    }
    Ok(())
}

// Integration tests for the background merge offload

mod common;

use common::{asset, create_test_config, eventually};
use market_sync::core::asset_list;
use market_sync::offload::MergeWorker;
use market_sync::{
    Action, MarketRegime, MergeOffload, OffloadConfig, OffloadMode, PriceUpdate, PriceUpdates, Tab,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_worker_result_matches_inline_merge() {
    let assets = asset_list(vec![asset("BTC", 100.0, 0.0), asset("ETH", 10.0, 0.0)]);
    let updates = PriceUpdates::single("ethusdt", PriceUpdate::new(11.0, 10.0));

    let worker = MergeOffload::new(&OffloadConfig::default());
    let inline = MergeOffload::inline();
    assert_eq!(worker.mode(), OffloadMode::Worker);

    let from_worker = worker.merge(7, Arc::clone(&assets), updates.clone()).await;
    let from_inline = inline.merge(7, Arc::clone(&assets), updates).await;

    assert_eq!(from_worker.seq, 7);
    assert_eq!(from_worker.assets, from_inline.assets);
    assert_eq!(from_worker.regime, from_inline.regime);
    assert_eq!(from_worker.signal, from_inline.signal);
    // Untouched entry is shared, not copied
    assert!(Arc::ptr_eq(&from_worker.assets[0], &assets[0]));
    assert_eq!(worker.mode(), OffloadMode::Worker);
}

#[tokio::test]
async fn test_fallback_is_sticky() {
    let offload = MergeOffload::new(&OffloadConfig::default());
    offload.terminate_worker();

    let assets = asset_list(vec![asset("SOL", 100.0, 0.0)]);
    for i in 0..3 {
        let reply = offload
            .merge(i, Arc::clone(&assets), PriceUpdates::single("solusdt", PriceUpdate::new(120.0, 20.0)))
            .await;
        assert_eq!(reply.assets[0].price, 120.0);
        assert_eq!(reply.regime, MarketRegime::Surge);
        assert_eq!(offload.mode(), OffloadMode::Inline);
    }
}

#[test]
fn test_worker_thread_stops_on_drop() {
    let worker = MergeWorker::spawn().unwrap();
    assert!(worker.is_running());
    drop(worker);
}

#[tokio::test]
async fn test_tab_keeps_merging_after_worker_dies() {
    let config = create_test_config();
    let tab = Tab::launch(&config, None, None).await.unwrap();
    assert_eq!(tab.offload_mode(), OffloadMode::Worker);

    tab.dispatcher()
        .dispatch(Action::UpdateMarkets(asset_list(vec![asset("BTC", 100.0, 0.0)])));
    tab.offload().terminate_worker();

    for price in [101.0, 102.0, 103.0] {
        tab.dispatcher().dispatch(Action::UpdatePrices(PriceUpdates::single(
            "btcusdt",
            PriceUpdate::new(price, 3.0),
        )));
    }

    assert!(eventually(Duration::from_secs(2), || tab.state().assets[0].price == 103.0).await);
    assert_eq!(tab.offload_mode(), OffloadMode::Inline);

    tab.close().await;
}

#[tokio::test]
async fn test_disabled_offload_merges_inline_from_start() {
    let mut config = create_test_config();
    config.offload.enabled = false;

    let tab = Tab::launch(&config, None, None).await.unwrap();
    assert_eq!(tab.offload_mode(), OffloadMode::Inline);

    tab.dispatcher()
        .dispatch(Action::UpdateMarkets(asset_list(vec![asset("ETH", 2_000.0, 0.0)])));
    tab.dispatcher().dispatch(Action::UpdatePrices(PriceUpdates::single(
        "ethusdt",
        PriceUpdate::new(2_100.0, 5.0),
    )));

    // No pump: the reducer ran synchronously
    assert_eq!(tab.state().assets[0].price, 2_100.0);
    tab.close().await;
}

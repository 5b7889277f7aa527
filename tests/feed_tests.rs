// Integration tests for the leader's live feed: reconnects, REST fallback, ticker stream

mod common;

use common::{asset, create_test_config, eventually};
use futures_util::{SinkExt, StreamExt};
use market_sync::core::{asset_list, ReconnectPolicy, Shutdown};
use market_sync::feed::{supervise_stream, MarketApi, SessionReport, StreamExit};
use market_sync::{
    Action, Database, Dispatcher, FeedOrchestrator, PriceHistory, Store, SyncError, WsStatus,
};
use mockito::Matcher;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::Message;

const MARKETS_BODY: &str = r#"[
    {"id":"bitcoin","symbol":"btc","name":"Bitcoin","current_price":64000.0,"market_cap":1.2e12,
     "market_cap_rank":1,"price_change_percentage_24h":2.5},
    {"id":"ethereum","symbol":"eth","name":"Ethereum","current_price":3200.0,"market_cap":3.8e11,
     "market_cap_rank":2,"price_change_percentage_24h":1.9}
]"#;

#[tokio::test]
async fn test_stream_gives_up_after_eight_reconnects() {
    let dispatcher = Dispatcher::local(Store::new());
    let shutdown = Shutdown::new();
    let policy = ReconnectPolicy::new(8, Duration::from_millis(1), Duration::from_millis(5), 2.0);
    let calls = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&calls);
    let exit = supervise_stream(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { SessionReport::failed_to_connect(SyncError::StreamConnection("refused".to_string())) }
        },
        &policy,
        &dispatcher,
        &shutdown,
    )
    .await;

    assert_eq!(exit, StreamExit::Exhausted(8));
    // Initial connect plus eight reconnects
    assert_eq!(calls.load(Ordering::SeqCst), 9);
    assert_ne!(dispatcher.state().ws_status, WsStatus::Connected);
    assert_eq!(dispatcher.state().ws_status, WsStatus::Disconnected);
}

#[test]
fn test_default_backoff_grows_and_is_bounded() {
    let policy = ReconnectPolicy::default();
    assert_eq!(policy.max_attempts(), 8);

    let mut previous = Duration::ZERO;
    for attempt in 1..=policy.max_attempts() {
        let delay = policy.delay_for(attempt).unwrap();
        assert!(delay >= previous);
        assert!(delay <= Duration::from_secs(30));
        previous = delay;
    }
    assert!(policy.delay_for(policy.max_attempts() + 1).is_none());
}

#[tokio::test]
async fn test_shutdown_interrupts_backoff() {
    let dispatcher = Dispatcher::local(Store::new());
    let shutdown = Shutdown::new();
    let policy = ReconnectPolicy::new(8, Duration::from_secs(10), Duration::from_secs(30), 2.0);

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.trigger();
    });

    let exit = tokio::time::timeout(
        Duration::from_secs(2),
        supervise_stream(
            || async { SessionReport::failed_to_connect(SyncError::StreamConnection("refused".to_string())) },
            &policy,
            &dispatcher,
            &shutdown,
        ),
    )
    .await
    .expect("backoff sleep was not cancelled");

    assert_eq!(exit, StreamExit::Shutdown);
    assert_eq!(dispatcher.state().ws_status, WsStatus::Reconnecting);
}

#[tokio::test]
async fn test_proxy_failure_falls_back_to_upstream() {
    let mut server = mockito::Server::new_async().await;
    let proxy = server
        .mock("GET", "/proxy/coins/markets")
        .match_query(Matcher::Any)
        .with_status(500)
        .expect(1)
        .create_async()
        .await;
    let upstream = server
        .mock("GET", "/coins/markets")
        .match_query(Matcher::UrlEncoded("vs_currency".into(), "usd".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(MARKETS_BODY)
        .expect(1)
        .create_async()
        .await;

    let mut config = create_test_config();
    config.feed.proxy_base_url = format!("{}/proxy", server.url());
    config.feed.upstream_base_url = server.url();

    let assets = MarketApi::new(&config.feed).markets().await.unwrap();
    assert_eq!(assets.len(), 2);
    assert_eq!(assets[0].symbol, "BTC");
    assert_eq!(assets[1].symbol_key(), "ethusdt");

    proxy.assert_async().await;
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_healthy_proxy_skips_upstream() {
    let mut server = mockito::Server::new_async().await;
    let proxy = server
        .mock("GET", "/proxy/fng")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"data":[{"value":"25","value_classification":"Extreme Fear"}]}"#)
        .expect(1)
        .create_async()
        .await;
    let upstream = server
        .mock("GET", "/fng")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut config = create_test_config();
    config.feed.proxy_base_url = format!("{}/proxy", server.url());
    config.feed.fear_greed_url = format!("{}/fng?limit=1", server.url());

    let data = MarketApi::new(&config.feed).fear_greed().await.unwrap();
    assert_eq!(data.value, 25);
    assert_eq!(data.label, "Extreme Fear");

    proxy.assert_async().await;
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_global_stats_without_proxy() {
    let mut server = mockito::Server::new_async().await;
    let global = server
        .mock("GET", "/global")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"data":{"active_cryptocurrencies":9000,"total_market_cap":{"usd":2.0e12},
                "total_volume":{"usd":8.0e10},"market_cap_percentage":{"btc":50.0,"eth":17.5},
                "market_cap_change_percentage_24h_usd":1.25}}"#,
        )
        .create_async()
        .await;

    let mut config = create_test_config();
    config.feed.upstream_base_url = server.url();

    let data = MarketApi::new(&config.feed).global().await.unwrap();
    assert_eq!(data.total_mcap, 2.0e12);
    assert_eq!(data.eth_dominance, 17.5);
    global.assert_async().await;
}

#[tokio::test]
async fn test_unresponsive_upstream_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Accept connections and never answer
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let mut config = create_test_config();
    config.feed.upstream_base_url = format!("http://{}", addr);
    config.feed.rest_timeout_ms = 200;

    let started = std::time::Instant::now();
    let result = MarketApi::new(&config.feed).markets().await;
    assert!(matches!(result, Err(SyncError::ApiTimeout(_))));
    assert!(started.elapsed() < Duration::from_secs(2));

    silent.abort();
}

#[tokio::test]
async fn test_market_refresh_failure_surfaces_error() {
    let mut server = mockito::Server::new_async().await;
    let _markets = server
        .mock("GET", "/coins/markets")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let mut config = create_test_config();
    config.feed.ws_url = "ws://127.0.0.1:1".to_string();
    config.feed.upstream_base_url = server.url();
    config.feed.fear_greed_url = format!("{}/fng?limit=1", server.url());
    config.feed.reconnect_base_delay_ms = 5;
    config.feed.reconnect_max_delay_ms = 10;
    config.feed.reconnect_max_attempts = 2;

    let dispatcher = Dispatcher::local(Store::new());
    let feed = FeedOrchestrator::new(&config, None).start(dispatcher.clone());

    let surfaced = eventually(Duration::from_secs(3), || {
        let state = dispatcher.state();
        state.error.is_some() && !state.loading
    })
    .await;
    assert!(surfaced);
    assert!(dispatcher.state().assets.is_empty());

    assert!(
        eventually(Duration::from_secs(3), || dispatcher.state().ws_status == WsStatus::Disconnected)
            .await
    );

    feed.stop().await;
}

#[tokio::test]
async fn test_ticker_stream_updates_prices_and_history() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();

        let subscribe = ws.next().await.unwrap().unwrap();
        let subscribe = subscribe.to_text().unwrap().to_string();

        ws.send(Message::Text(r#"{"result":null,"id":1}"#.to_string())).await.unwrap();
        ws.send(Message::Text(
            r#"{"stream":"btcusdt@ticker","data":{"e":"24hrTicker","s":"BTCUSDT","c":"65000.5","P":"3.1","h":"65500","l":"62000","q":"1000000"}}"#
                .to_string(),
        ))
        .await
        .unwrap();

        while let Some(Ok(_)) = ws.next().await {}
        subscribe
    });

    let db = Database::new_in_memory().unwrap();
    db.run_migrations().unwrap();

    let mut config = create_test_config();
    config.feed.ws_url = format!("ws://{}", addr);
    config.feed.upstream_base_url = "http://127.0.0.1:1".to_string();
    config.feed.fear_greed_url = "http://127.0.0.1:1/fng?limit=1".to_string();

    let dispatcher = Dispatcher::local(Store::new());
    dispatcher.dispatch(Action::UpdateMarkets(asset_list(vec![
        asset("BTC", 60_000.0, 1.0),
        asset("ETH", 3_000.0, 1.0),
    ])));

    let feed = FeedOrchestrator::new(&config, Some(db.clone())).start(dispatcher.clone());

    let ticked = eventually(Duration::from_secs(3), || dispatcher.state().assets[0].price == 65_000.5).await;
    assert!(ticked);

    let state = dispatcher.state();
    assert_eq!(state.ws_status, WsStatus::Connected);
    assert_eq!(state.assets[0].change24h, 3.1);
    assert_eq!(state.assets[1].price, 3_000.0);
    assert_eq!(dispatcher.prices().read("btcusdt"), Some(65_000.5));

    let history = PriceHistory::new(db, config.storage.history_len);
    let recorded = eventually(Duration::from_secs(2), || {
        history.load_recent("btcusdt", 10).map(|p| p.len() == 1).unwrap_or(false)
    })
    .await;
    assert!(recorded);
    let points = history.load_recent("btcusdt", 10).unwrap();
    assert_eq!(points[0].price, 65_000.5);

    feed.stop().await;

    let subscribe = server.await.unwrap();
    let subscribe: serde_json::Value = serde_json::from_str(&subscribe).unwrap();
    assert_eq!(subscribe["method"], "SUBSCRIBE");
    assert_eq!(subscribe["params"][0], "btcusdt@ticker");
}

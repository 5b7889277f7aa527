// Leader-only live feed: ticker stream plus three REST pollers

use crate::config::Config;
use crate::core::recovery::{ReconnectPolicy, Shutdown};
use crate::core::types::{PriceDirection, PriceUpdates, WsStatus};
use crate::db::{Database, HistoryWriter, PriceHistory, StateCache};
use crate::error::{SyncError, SyncResult};
use crate::feed::rest::MarketApi;
use crate::feed::ticker::{parse_ticker, DirectionTracker};
use crate::store::{Action, Dispatcher};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};

/// How one stream session ended
#[derive(Debug)]
pub struct SessionReport {
    /// The connection was established before it ended
    pub connected: bool,
    pub result: SyncResult<()>,
}

impl SessionReport {
    pub fn failed_to_connect(error: SyncError) -> Self {
        Self {
            connected: false,
            result: Err(error),
        }
    }

    pub fn dropped(error: SyncError) -> Self {
        Self {
            connected: true,
            result: Err(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamExit {
    Shutdown,
    /// Gave up after this many reconnect attempts
    Exhausted(u32),
}

/// Run stream sessions until shutdown or until the reconnect policy gives up.
///
/// Every session end that is not a shutdown schedules a reconnect with the
/// policy's delay and reports `Reconnecting`. A session that managed to
/// connect resets the attempt counter. On exhaustion the status is set to
/// `Disconnected` and no further attempt is made.
pub async fn supervise_stream<F, Fut>(
    mut run_session: F,
    policy: &ReconnectPolicy,
    dispatcher: &Dispatcher,
    shutdown: &Shutdown,
) -> StreamExit
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SessionReport>,
{
    let mut attempt: u32 = 0;

    loop {
        if shutdown.is_triggered() {
            return StreamExit::Shutdown;
        }

        let report = tokio::select! {
            report = run_session() => report,
            _ = shutdown.cancelled() => return StreamExit::Shutdown,
        };
        if shutdown.is_triggered() {
            return StreamExit::Shutdown;
        }

        if report.connected {
            attempt = 0;
        }
        match &report.result {
            Ok(()) => info!("📴 Ticker stream ended"),
            Err(e) if e.is_retryable() => warn!("⚠️  Ticker stream lost: {}", e),
            Err(e) => error!("❌ [{}] Ticker stream failed: {}", e.category(), e),
        }

        attempt += 1;
        match policy.delay_for(attempt) {
            Some(delay) => {
                dispatcher.dispatch(Action::SetWsStatus(WsStatus::Reconnecting));
                info!(
                    "🔄 Reconnecting in {:?} (attempt {}/{})",
                    delay,
                    attempt,
                    policy.max_attempts()
                );
                if !shutdown.sleep(delay).await {
                    return StreamExit::Shutdown;
                }
            }
            None => {
                let attempts = attempt - 1;
                error!("❌ {}", SyncError::ReconnectExhausted(attempts).user_message());
                dispatcher.dispatch(Action::SetWsStatus(WsStatus::Disconnected));
                return StreamExit::Exhausted(attempts);
            }
        }
    }
}

/// Per-feed state shared by every stream session
struct TickerContext {
    url: String,
    symbols: Vec<String>,
    dispatcher: Dispatcher,
    directions: Mutex<DirectionTracker>,
    history: Option<HistoryWriter>,
    tracked: HashSet<String>,
    log_ticks: bool,
}

impl TickerContext {
    fn subscribe_message(&self) -> String {
        let params: Vec<String> = self.symbols.iter().map(|s| format!("{}@ticker", s)).collect();
        json!({
            "method": "SUBSCRIBE",
            "params": params,
            "id": 1
        })
        .to_string()
    }

    fn handle_text(&self, text: &str) {
        let tick = match parse_ticker(text) {
            Some(tick) => tick,
            None => {
                debug!("dropping non-ticker frame");
                return;
            }
        };

        let direction = match self.directions.lock() {
            Ok(mut tracker) => tracker.observe(&tick.symbol, tick.price),
            Err(_) => PriceDirection::Neutral,
        };
        if self.log_ticks {
            info!("📈 {} {:.4} ({:+.2}%)", tick.symbol, tick.price, tick.change24h);
        }

        self.dispatcher.dispatch(Action::UpdatePrices(PriceUpdates::single(
            tick.symbol.clone(),
            tick.to_update(direction),
        )));

        if let Some(history) = &self.history {
            if self.tracked.contains(&tick.symbol) {
                history.record(&tick.symbol, tick.price);
            }
        }
    }
}

async fn ticker_session(ctx: Arc<TickerContext>) -> SessionReport {
    let (ws_stream, _) = match connect_async(ctx.url.as_str()).await {
        Ok(connection) => connection,
        Err(e) => return SessionReport::failed_to_connect(e.into()),
    };
    info!("✅ Connected to ticker stream");
    ctx.dispatcher.dispatch(Action::SetWsStatus(WsStatus::Connected));

    let (mut write, mut read) = ws_stream.split();
    if let Err(e) = write.send(Message::Text(ctx.subscribe_message())).await {
        return SessionReport::dropped(e.into());
    }
    info!("📡 Subscribed to {} ticker streams", ctx.symbols.len());

    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => ctx.handle_text(&text),
            Ok(Message::Ping(payload)) => {
                if let Err(e) = write.send(Message::Pong(payload)).await {
                    return SessionReport::dropped(e.into());
                }
            }
            Ok(Message::Close(_)) => {
                return SessionReport::dropped(SyncError::StreamClosed("server sent close".to_string()));
            }
            Ok(_) => {}
            Err(e) => return SessionReport::dropped(e.into()),
        }
    }

    SessionReport::dropped(SyncError::StreamClosed("stream ended".to_string()))
}

/// Shared by the three pollers
struct PollContext {
    api: MarketApi,
    dispatcher: Dispatcher,
    cache: Option<StateCache>,
}

impl PollContext {
    async fn refresh_markets(&self) {
        match self.api.markets().await {
            Ok(assets) if assets.is_empty() => {
                warn!("⚠️  Market list came back empty, keeping current assets");
                self.dispatcher.dispatch(Action::SetLoading(false));
            }
            Ok(assets) => {
                debug!("market refresh: {} assets", assets.len());
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.save_assets(&assets) {
                        debug!("market cache write skipped: {}", e);
                    }
                }
                self.dispatcher.dispatch(Action::UpdateMarkets(assets));
            }
            Err(e) => {
                error!("❌ [{}] Market refresh failed: {}", e.category(), e);
                self.dispatcher.dispatch(Action::SetError(Some(e.to_string())));
                self.dispatcher.dispatch(Action::SetLoading(false));
            }
        }
    }

    async fn refresh_global(&self) {
        match self.api.global().await {
            Ok(global) => self.dispatcher.dispatch(Action::UpdateGlobal(global)),
            Err(e) => warn!("⚠️  Global stats refresh failed: {}", e),
        }
    }

    async fn refresh_fear_greed(&self) {
        match self.api.fear_greed().await {
            Ok(data) => self.dispatcher.dispatch(Action::UpdateFearGreed(data)),
            Err(e) => warn!("⚠️  Fear/greed refresh failed: {}", e),
        }
    }
}

/// Poll immediately, then every `interval`, until shutdown
async fn poll_every<F, Fut>(name: &'static str, interval: Duration, shutdown: Shutdown, mut poll: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        tokio::select! {
            _ = poll() => {}
            _ = shutdown.cancelled() => break,
        }
        if !shutdown.sleep(interval).await {
            break;
        }
    }
    debug!("{} poller stopped", name);
}

/// Builds and starts the leader's upstream tasks. Kept by the tab so the feed
/// can be restarted whenever leadership comes back.
#[derive(Debug, Clone)]
pub struct FeedOrchestrator {
    config: Config,
    db: Option<Database>,
}

impl FeedOrchestrator {
    pub fn new(config: &Config, db: Option<Database>) -> Self {
        Self {
            config: config.clone(),
            db,
        }
    }

    pub fn start(&self, dispatcher: Dispatcher) -> FeedHandle {
        let feed = &self.config.feed;
        let shutdown = Shutdown::new();
        let mut tasks = Vec::new();

        info!(
            "🚀 Starting live feed: {} symbols, markets every {}s",
            feed.symbols.len(),
            feed.markets_interval_secs
        );

        let (history, history_task) = match self.db.clone() {
            Some(db) => {
                let (writer, task) = HistoryWriter::spawn(PriceHistory::new(db, self.config.storage.history_len));
                (Some(writer), Some(task))
            }
            None => (None, None),
        };

        let ticker = Arc::new(TickerContext {
            url: feed.ws_url.clone(),
            symbols: feed.symbols.clone(),
            dispatcher: dispatcher.clone(),
            directions: Mutex::new(DirectionTracker::new()),
            history,
            tracked: self.config.storage.tracked_symbols.iter().cloned().collect(),
            log_ticks: self.config.logging.enable_tick_logging,
        });
        let policy = ReconnectPolicy::new(
            feed.reconnect_max_attempts,
            Duration::from_millis(feed.reconnect_base_delay_ms),
            Duration::from_millis(feed.reconnect_max_delay_ms),
            2.0,
        );
        {
            let dispatcher = dispatcher.clone();
            let shutdown = shutdown.clone();
            tasks.push(tokio::spawn(async move {
                let exit = supervise_stream(
                    || ticker_session(Arc::clone(&ticker)),
                    &policy,
                    &dispatcher,
                    &shutdown,
                )
                .await;
                debug!("ticker stream task finished: {:?}", exit);
            }));
        }

        let polls = Arc::new(PollContext {
            api: MarketApi::new(feed),
            dispatcher,
            cache: if self.config.storage.cache_markets {
                self.db.clone().map(StateCache::new)
            } else {
                None
            },
        });

        let ctx = Arc::clone(&polls);
        tasks.push(tokio::spawn(poll_every(
            "markets",
            Duration::from_secs(feed.markets_interval_secs),
            shutdown.clone(),
            move || {
                let ctx = Arc::clone(&ctx);
                async move { ctx.refresh_markets().await }
            },
        )));

        let ctx = Arc::clone(&polls);
        tasks.push(tokio::spawn(poll_every(
            "global",
            Duration::from_secs(feed.global_interval_secs),
            shutdown.clone(),
            move || {
                let ctx = Arc::clone(&ctx);
                async move { ctx.refresh_global().await }
            },
        )));

        let ctx = polls;
        tasks.push(tokio::spawn(poll_every(
            "fear/greed",
            Duration::from_secs(feed.fear_greed_interval_secs),
            shutdown.clone(),
            move || {
                let ctx = Arc::clone(&ctx);
                async move { ctx.refresh_fear_greed().await }
            },
        )));

        // Exits once the stream task has dropped the last writer
        tasks.extend(history_task);

        FeedHandle { shutdown, tasks }
    }
}

/// Running feed. `stop` cancels every timer and joins every task.
#[derive(Debug)]
pub struct FeedHandle {
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

impl FeedHandle {
    pub fn is_running(&self) -> bool {
        !self.shutdown.is_triggered() && self.tasks.iter().any(|t| !t.is_finished())
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("⚠️  Feed task ended abnormally: {}", e);
            }
        }
        info!("🛑 Live feed stopped");
    }
}

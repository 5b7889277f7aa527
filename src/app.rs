//! Tab lifecycle
//!
//! A [`Tab`] is one dashboard session: its own store, dispatcher, merge
//! offload and (when a hub is given) a port on the shared sync bus. The
//! election driver task owns the bus receiver; it feeds frames to the
//! [`LeaderElection`] state machine, carries out the resulting effects, and
//! applies the leader's data frames while this tab is not leading.

use crate::config::Config;
use crate::db::{Database, StateCache};
use crate::core::recovery::Shutdown;
use crate::error::SyncResult;
use crate::feed::{FeedHandle, FeedOrchestrator};
use crate::offload::{MergeOffload, MergePump, OffloadMode};
use crate::store::{Action, AppState, Dispatcher, PriceBuffer, StateHandle, Store};
use crate::sync::{ElectionEffect, LeaderElection, SyncBus, SyncHub, TabId};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub struct Tab {
    id: TabId,
    dispatcher: Dispatcher,
    offload: Arc<MergeOffload>,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

impl Tab {
    /// Boot a tab. Without a hub there is nobody to coordinate with, so the
    /// tab is leader by the time this returns.
    pub async fn launch(config: &Config, hub: Option<&SyncHub>, db: Option<Database>) -> SyncResult<Tab> {
        config.validate()?;

        let id = TabId::generate();
        let shutdown = Shutdown::new();
        let store = Store::new();
        let mut tasks = Vec::new();

        let offload = Arc::new(MergeOffload::new(&config.offload));
        let pump = if offload.is_inline() {
            None
        } else {
            let (pump, task) = MergePump::spawn(Arc::clone(&offload), store.clone(), shutdown.clone());
            tasks.push(task);
            Some(pump)
        };

        let bus = hub.map(|hub| hub.connect(id.clone()));
        let prices = Arc::new(PriceBuffer::new(config.feed.symbols.iter().cloned()));
        let dispatcher = Dispatcher::new(store, prices, bus.as_ref().map(SyncBus::sender), pump);

        if let Some(db) = &db {
            db.run_migrations()?;
            if config.storage.cache_markets {
                warm_start(db, &dispatcher);
            }
        }

        let mut role = LeaderRole {
            tab_id: id.clone(),
            dispatcher: dispatcher.clone(),
            orchestrator: FeedOrchestrator::new(config, db),
            feed_enabled: config.feed.enabled,
            verbose: config.logging.enable_election_logging,
            feed: None,
        };

        let mut election = LeaderElection::new(
            id.clone(),
            Duration::from_millis(config.election.claim_delay_ms),
        );
        let claim_in = role.apply(election.start(bus.is_some()), bus.as_ref()).await;

        let stop = shutdown.clone();
        let task = match bus {
            Some(bus) => tokio::spawn(drive_election(election, bus, role, claim_in, stop)),
            None => tokio::spawn(async move {
                stop.cancelled().await;
                role.stop_feed().await;
            }),
        };
        tasks.push(task);

        info!("🪟 Tab {} launched ({} offload)", id, mode_label(offload.mode()));

        Ok(Tab {
            id,
            dispatcher,
            offload,
            shutdown,
            tasks,
        })
    }

    pub fn id(&self) -> &TabId {
        &self.id
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn state(&self) -> Arc<AppState> {
        self.dispatcher.state()
    }

    pub fn handle(&self) -> StateHandle {
        self.dispatcher.handle()
    }

    pub fn is_leader(&self) -> bool {
        self.state().is_leader
    }

    pub fn offload(&self) -> &Arc<MergeOffload> {
        &self.offload
    }

    pub fn offload_mode(&self) -> OffloadMode {
        self.offload.mode()
    }

    /// Cancel every timer and task of this tab and release the merge thread.
    /// Peers are not told; the bus port just goes quiet.
    pub async fn close(mut self) {
        self.shutdown.trigger();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!("⚠️  Tab task ended abnormally: {}", e);
            }
        }
        self.offload.shutdown().await;
        info!("👋 Tab {} closed", self.id);
    }
}

impl Drop for Tab {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

fn mode_label(mode: OffloadMode) -> &'static str {
    match mode {
        OffloadMode::Worker => "worker",
        OffloadMode::Inline => "inline",
    }
}

fn warm_start(db: &Database, dispatcher: &Dispatcher) {
    match StateCache::new(db.clone()).load_assets() {
        Ok(Some(assets)) if !assets.is_empty() => {
            info!("💾 Warm start with {} cached assets", assets.len());
            dispatcher.dispatch(Action::UpdateMarkets(assets));
        }
        Ok(_) => {}
        Err(e) => debug!("market cache unreadable, starting cold: {}", e),
    }
}

/// What the tab does when its role changes
struct LeaderRole {
    tab_id: TabId,
    dispatcher: Dispatcher,
    orchestrator: FeedOrchestrator,
    feed_enabled: bool,
    verbose: bool,
    feed: Option<FeedHandle>,
}

impl LeaderRole {
    /// Carry out election effects; returns the claim delay if one was scheduled
    async fn apply(&mut self, effects: Vec<ElectionEffect>, bus: Option<&SyncBus>) -> Option<Duration> {
        let mut claim_in = None;

        for effect in effects {
            match effect {
                ElectionEffect::Broadcast(message) => {
                    if let Some(bus) = bus {
                        bus.publish(message);
                    }
                }
                ElectionEffect::ScheduleClaim(delay) => claim_in = Some(delay),
                ElectionEffect::BecameLeader => {
                    self.announce(format!("👑 Tab {} is now leader", self.tab_id));
                    self.dispatcher.dispatch(Action::SetLeader(true));
                    self.start_feed();
                }
                ElectionEffect::SteppedDown => {
                    self.announce(format!("🤝 Tab {} stepped down", self.tab_id));
                    self.dispatcher.dispatch(Action::SetLeader(false));
                    self.stop_feed().await;
                }
                ElectionEffect::TabCountChanged(count) => {
                    self.dispatcher.dispatch(Action::SetTabCount(count));
                }
            }
        }

        claim_in
    }

    fn start_feed(&mut self) {
        if !self.feed_enabled || self.feed.is_some() {
            return;
        }
        self.feed = Some(self.orchestrator.start(self.dispatcher.clone()));
    }

    async fn stop_feed(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.stop().await;
        }
    }

    fn announce(&self, message: String) {
        if self.verbose {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }
}

async fn claim_deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

async fn drive_election(
    mut election: LeaderElection,
    mut bus: SyncBus,
    mut role: LeaderRole,
    claim_in: Option<Duration>,
    shutdown: Shutdown,
) {
    let mut claim_at = claim_in.map(|delay| Instant::now() + delay);

    loop {
        let effects = tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = claim_deadline(claim_at) => {
                claim_at = None;
                election.on_claim_timer()
            }
            frame = bus.recv() => match frame {
                Some(envelope) => {
                    let effects = election.on_message(&envelope.from, &envelope.message);
                    let foreign = envelope.from != *bus.tab_id();
                    if foreign && !envelope.message.is_election() && !election.is_leader() {
                        role.dispatcher.apply_remote(envelope.message);
                    }
                    effects
                }
                None => break,
            },
        };

        if let Some(delay) = role.apply(effects, Some(&bus)).await {
            claim_at = Some(Instant::now() + delay);
        }
    }

    role.stop_feed().await;
    bus.close();
}

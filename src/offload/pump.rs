// Serializes tick batches through the offload, one merge in flight at a time

use crate::core::recovery::Shutdown;
use crate::core::types::PriceUpdates;
use crate::offload::MergeOffload;
use crate::store::{Action, MergeOutcome, Store};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// A queued batch and the `markets_version` it was dispatched against
type Stamped = (u64, PriceUpdates);

/// Submission side of the pump. Batches queued while a merge is running are
/// folded together (later ticks win) and sent as the next request. Batches
/// dispatched before the latest full refresh are discarded, as are their
/// merge results.
#[derive(Debug, Clone)]
pub struct MergePump {
    tx: mpsc::UnboundedSender<Stamped>,
}

impl MergePump {
    pub fn spawn(offload: Arc<MergeOffload>, store: Store, shutdown: Shutdown) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(offload, store, rx, shutdown));
        (Self { tx }, task)
    }

    /// Queue a batch. Hands it back if the pump has stopped.
    pub fn submit(&self, markets_version: u64, updates: PriceUpdates) -> Result<(), PriceUpdates> {
        self.tx
            .send((markets_version, updates))
            .map_err(|mpsc::error::SendError((_, updates))| updates)
    }
}

async fn run(
    offload: Arc<MergeOffload>,
    store: Store,
    mut rx: mpsc::UnboundedReceiver<Stamped>,
    shutdown: Shutdown,
) {
    let mut seq: u64 = 0;

    loop {
        let first = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = rx.recv() => match next {
                Some(stamped) => stamped,
                None => break,
            },
        };

        let base = store.current();
        let mut batch = PriceUpdates::new();
        let mut superseded = 0usize;
        for (stamp, updates) in std::iter::once(first).chain(std::iter::from_fn(|| rx.try_recv().ok())) {
            if stamp == base.markets_version {
                batch.absorb(updates);
            } else {
                superseded += 1;
            }
        }
        if superseded > 0 {
            debug!("dropped {} tick batches superseded by a market refresh", superseded);
        }
        if batch.is_empty() {
            continue;
        }

        if offload.is_inline() {
            store.apply(Action::UpdatePrices(batch));
            continue;
        }

        seq += 1;
        let reply = offload.merge(seq, Arc::clone(&base.assets), batch.clone()).await;

        store.apply(Action::MergeResult(MergeOutcome {
            seq: reply.seq,
            base_version: base.assets_version,
            markets_version: base.markets_version,
            assets: reply.assets,
            regime: reply.regime,
            signal: reply.signal,
            updates: batch,
        }));
    }

    debug!("merge pump stopped after {} offloaded batches", seq);
}

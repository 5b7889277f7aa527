// Dedicated merge thread fed over a std channel

use crate::core::market_state::classify;
use crate::core::merge::merge_ticks;
use crate::core::types::{AiSignal, AssetList, MarketRegime, PriceUpdates};
use crate::error::{SyncError, SyncResult};
use std::sync::mpsc;
use std::thread;
use tokio::sync::oneshot;
use tracing::debug;

/// One merge job: the collection as the submitter saw it plus the batch
#[derive(Debug)]
pub struct MergeRequest {
    pub seq: u64,
    pub assets: AssetList,
    pub updates: PriceUpdates,
    pub reply: oneshot::Sender<MergeReply>,
}

#[derive(Debug, Clone)]
pub struct MergeReply {
    pub seq: u64,
    pub assets: AssetList,
    pub regime: MarketRegime,
    pub signal: AiSignal,
}

impl MergeReply {
    /// Same computation the worker runs, on the calling thread
    pub fn compute(seq: u64, assets: &AssetList, updates: &PriceUpdates) -> Self {
        let assets = merge_ticks(assets, updates);
        let (regime, signal) = classify(&assets);
        Self {
            seq,
            assets,
            regime,
            signal,
        }
    }
}

/// Handle to the merge thread. Dropping it closes the channel and detaches
/// the thread, which exits after its current job; only [`MergeWorker::join`]
/// waits for it.
#[derive(Debug)]
pub struct MergeWorker {
    tx: Option<mpsc::Sender<MergeRequest>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl MergeWorker {
    pub fn spawn() -> SyncResult<Self> {
        Self::spawn_with(MergeReply::compute)
    }

    /// Spawn a thread answering every request with `merge`
    pub(crate) fn spawn_with<F>(merge: F) -> SyncResult<Self>
    where
        F: Fn(u64, &AssetList, &PriceUpdates) -> MergeReply + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<MergeRequest>();

        let thread = thread::Builder::new()
            .name("merge-worker".to_string())
            .spawn(move || {
                while let Ok(request) = rx.recv() {
                    let reply = merge(request.seq, &request.assets, &request.updates);
                    // Submitter may have timed out and gone away
                    let _ = request.reply.send(reply);
                }
                debug!("merge worker channel closed, thread exiting");
            })
            .map_err(|e| SyncError::OffloadUnavailable(format!("failed to spawn merge thread: {}", e)))?;

        Ok(Self {
            tx: Some(tx),
            thread: Some(thread),
        })
    }

    /// Queue a merge; the reply arrives on the returned receiver
    pub fn submit(
        &self,
        seq: u64,
        assets: AssetList,
        updates: PriceUpdates,
    ) -> SyncResult<oneshot::Receiver<MergeReply>> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| SyncError::OffloadUnavailable("merge worker terminated".to_string()))?;

        let (reply, rx) = oneshot::channel();
        tx.send(MergeRequest {
            seq,
            assets,
            updates,
            reply,
        })
        .map_err(|_| SyncError::OffloadUnavailable("merge worker channel closed".to_string()))?;

        Ok(rx)
    }

    pub fn is_running(&self) -> bool {
        self.tx.is_some()
    }

    /// Close the channel; the thread exits once its current job is done
    pub fn close(&mut self) {
        self.tx.take();
    }

    /// Close the channel and block until the thread exits. Never call this
    /// from async code: a busy worker holds the caller for the whole job.
    pub fn join(mut self) -> SyncResult<()> {
        self.close();
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| SyncError::OffloadUnavailable("merge thread panicked".to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for MergeWorker {
    fn drop(&mut self) {
        self.close();
        if self.thread.take().is_some() {
            debug!("merge worker detached");
        }
    }
}

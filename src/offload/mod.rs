//! Background tick merging
//!
//! [`MergeOffload`] runs merges on a dedicated thread while it is healthy and
//! on the caller otherwise. The switch to inline is one-way for the lifetime
//! of the offload: a spawn failure, a closed channel, a lost reply or a reply
//! timeout all land in the same place. [`MergePump`] sits in front of it and
//! keeps at most one merge in flight so results come back in submission
//! order.

pub mod worker;
pub mod pump;

pub use pump::MergePump;
pub use worker::{MergeReply, MergeRequest, MergeWorker};

use crate::config::OffloadConfig;
use crate::core::types::{AssetList, PriceUpdates};
use crate::error::{SyncError, SyncResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffloadMode {
    Worker,
    Inline,
}

#[derive(Debug)]
pub struct MergeOffload {
    worker: Mutex<Option<MergeWorker>>,
    inline: AtomicBool,
    reply_timeout: Duration,
}

impl MergeOffload {
    pub fn new(config: &OffloadConfig) -> Self {
        let reply_timeout = Duration::from_millis(config.reply_timeout_ms);

        if !config.enabled {
            info!("🧮 Merge offload disabled, merging inline");
            return Self::inline_with_timeout(reply_timeout);
        }

        match MergeWorker::spawn() {
            Ok(worker) => {
                info!("🧮 Merge worker started");
                Self::with_worker(worker, reply_timeout)
            }
            Err(e) => {
                warn!("⚠️  {}, merging inline", e);
                Self::inline_with_timeout(reply_timeout)
            }
        }
    }

    /// An offload that never leaves the calling thread
    pub fn inline() -> Self {
        Self::inline_with_timeout(Duration::from_millis(OffloadConfig::default().reply_timeout_ms))
    }

    pub(crate) fn with_worker(worker: MergeWorker, reply_timeout: Duration) -> Self {
        Self {
            worker: Mutex::new(Some(worker)),
            inline: AtomicBool::new(false),
            reply_timeout,
        }
    }

    fn inline_with_timeout(reply_timeout: Duration) -> Self {
        Self {
            worker: Mutex::new(None),
            inline: AtomicBool::new(true),
            reply_timeout,
        }
    }

    pub fn mode(&self) -> OffloadMode {
        if self.inline.load(Ordering::SeqCst) {
            OffloadMode::Inline
        } else {
            OffloadMode::Worker
        }
    }

    pub fn is_inline(&self) -> bool {
        self.mode() == OffloadMode::Inline
    }

    /// Merge `updates` into `assets`. Never fails: worker trouble degrades to
    /// an inline merge, and every later call stays inline.
    pub async fn merge(&self, seq: u64, assets: AssetList, updates: PriceUpdates) -> MergeReply {
        if !self.is_inline() {
            match self.merge_on_worker(seq, &assets, &updates).await {
                Ok(reply) => return reply,
                Err(e) => self.fall_back(&e),
            }
        }
        MergeReply::compute(seq, &assets, &updates)
    }

    async fn merge_on_worker(
        &self,
        seq: u64,
        assets: &AssetList,
        updates: &PriceUpdates,
    ) -> SyncResult<MergeReply> {
        let pending = {
            let guard = self
                .worker
                .lock()
                .map_err(|_| SyncError::OffloadUnavailable("merge worker lock poisoned".to_string()))?;
            match guard.as_ref() {
                Some(worker) => worker.submit(seq, assets.clone(), updates.clone())?,
                None => return Err(SyncError::OffloadUnavailable("no merge worker".to_string())),
            }
        };

        let reply = tokio::time::timeout(self.reply_timeout, pending)
            .await
            .map_err(|_| {
                SyncError::OffloadUnavailable(format!(
                    "merge reply timed out after {}ms",
                    self.reply_timeout.as_millis()
                ))
            })?
            .map_err(|_| SyncError::OffloadUnavailable("merge worker dropped the reply".to_string()))?;

        if reply.seq != seq {
            return Err(SyncError::OffloadUnavailable(format!(
                "merge reply out of order: expected {}, got {}",
                seq, reply.seq
            )));
        }
        Ok(reply)
    }

    fn fall_back(&self, cause: &SyncError) {
        if self.inline.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!("⚠️  {}; merging inline from now on", cause);
        // Detached: a hung thread finishes its job in the background
        drop(self.take_worker());
    }

    /// Close the merge thread's channel without switching modes; the next
    /// merge notices.
    pub fn terminate_worker(&self) {
        if let Ok(mut guard) = self.worker.lock() {
            if let Some(worker) = guard.as_mut() {
                worker.close();
            }
        }
    }

    /// Release the thread for good (tab teardown). The join runs on the
    /// blocking pool and is abandoned after the reply timeout.
    pub async fn shutdown(&self) {
        self.inline.store(true, Ordering::SeqCst);
        let Some(worker) = self.take_worker() else {
            return;
        };

        let joined = tokio::task::spawn_blocking(move || worker.join());
        match tokio::time::timeout(self.reply_timeout, joined).await {
            Ok(Ok(Ok(()))) => debug!("merge worker joined"),
            Ok(Ok(Err(e))) => warn!("⚠️  {}", e),
            Ok(Err(e)) => warn!("⚠️  Merge worker join task failed: {}", e),
            Err(_) => warn!(
                "⚠️  Merge worker still busy after {}ms, leaving it detached",
                self.reply_timeout.as_millis()
            ),
        }
    }

    fn take_worker(&self) -> Option<MergeWorker> {
        match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        }
    }
}

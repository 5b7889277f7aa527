// Broadcast transport shared by the tabs of one process

use crate::sync::protocol::{Envelope, SyncMessage};
use crate::sync::tab_id::TabId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Named channel every tab of a browsing context group connects to
#[derive(Debug, Clone)]
pub struct SyncHub {
    tx: broadcast::Sender<Envelope>,
}

impl SyncHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Open a port on the channel for one tab
    pub fn connect(&self, tab_id: TabId) -> SyncBus {
        SyncBus {
            sender: BusSender {
                tab_id,
                tx: self.tx.clone(),
                closed: Arc::new(AtomicBool::new(false)),
            },
            rx: self.tx.subscribe(),
        }
    }

    /// Number of open ports
    pub fn port_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Publishing half of a tab's port; cheap to clone into the dispatcher
#[derive(Debug, Clone)]
pub struct BusSender {
    tab_id: TabId,
    tx: broadcast::Sender<Envelope>,
    closed: Arc<AtomicBool>,
}

impl BusSender {
    pub fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    /// Fire-and-forget publish; a closed port or an empty channel drops the frame
    pub fn publish(&self, message: SyncMessage) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(Envelope {
            from: self.tab_id.clone(),
            message,
        });
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// One tab's open port: publish plus an ordered stream of every frame,
/// including the tab's own (the election uses its own claim as an ordering
/// marker; everything else filters them out).
#[derive(Debug)]
pub struct SyncBus {
    sender: BusSender,
    rx: broadcast::Receiver<Envelope>,
}

impl SyncBus {
    pub fn sender(&self) -> BusSender {
        self.sender.clone()
    }

    pub fn tab_id(&self) -> &TabId {
        self.sender.tab_id()
    }

    pub fn publish(&self, message: SyncMessage) {
        self.sender.publish(message);
    }

    /// Next frame in channel order, or `None` once the channel is gone
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("⚠️  Tab {} lagged, {} bus frames skipped", self.sender.tab_id, skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next frame if one is already queued
    pub fn try_recv(&mut self) -> Option<Envelope> {
        loop {
            match self.rx.try_recv() {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Close the port. No goodbye frame is sent; peers never learn about it.
    pub fn close(self) {
        self.sender.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_reach_every_port_in_order() {
        let hub = SyncHub::new(16);
        let a = hub.connect(TabId::from("a"));
        let mut b = hub.connect(TabId::from("b"));

        a.publish(SyncMessage::TabPing { tab_id: TabId::from("a") });
        a.publish(SyncMessage::TabPong { tab_id: TabId::from("a") });

        let first = b.recv().await.unwrap();
        let second = b.recv().await.unwrap();
        assert_eq!(first.from, TabId::from("a"));
        assert!(matches!(first.message, SyncMessage::TabPing { .. }));
        assert!(matches!(second.message, SyncMessage::TabPong { .. }));
    }

    #[tokio::test]
    async fn test_own_frames_are_echoed() {
        let hub = SyncHub::new(16);
        let mut a = hub.connect(TabId::from("a"));
        a.publish(SyncMessage::TabPing { tab_id: TabId::from("a") });
        assert_eq!(a.recv().await.unwrap().from, TabId::from("a"));
    }

    #[test]
    fn test_closed_sender_publishes_nothing() {
        let hub = SyncHub::new(16);
        let a = hub.connect(TabId::from("a"));
        let mut b = hub.connect(TabId::from("b"));
        let sender = a.sender();

        a.close();
        sender.publish(SyncMessage::TabPing { tab_id: TabId::from("a") });

        assert!(sender.is_closed());
        assert!(b.rx.try_recv().is_err());
        assert_eq!(hub.port_count(), 1);
    }
}

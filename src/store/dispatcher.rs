// Enhanced dispatch: leader fan-out, price side channel, offloaded merges

use crate::core::types::PriceUpdates;
use crate::offload::MergePump;
use crate::store::{Action, AppState, PriceBuffer, StateHandle, Store};
use crate::sync::{BusSender, SyncMessage};
use std::sync::{Arc, Mutex};
use tracing::trace;

/// The one dispatch entry point of a tab.
///
/// Built once per tab and cloned into every producer; clones share identity
/// (see [`Dispatcher::same_as`]). On the leader, replicable actions are
/// published on the bus before they are applied locally, and local order
/// follows bus order. Price batches go through the merge pump when one is
/// attached, everything else is reduced in place.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Debug)]
struct DispatcherInner {
    store: Store,
    bus: Option<BusSender>,
    pump: Option<MergePump>,
    prices: Arc<PriceBuffer>,
    order: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        store: Store,
        prices: Arc<PriceBuffer>,
        bus: Option<BusSender>,
        pump: Option<MergePump>,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                store,
                bus,
                pump,
                prices,
                order: Mutex::new(()),
            }),
        }
    }

    /// Dispatcher with no bus and no offload
    pub fn local(store: Store) -> Self {
        Self::new(store, Arc::new(PriceBuffer::new(Vec::<String>::new())), None, None)
    }

    pub fn dispatch(&self, action: Action) {
        trace!("dispatch {}", action.name());
        let _order = self.inner.order.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(bus) = &self.inner.bus {
            if self.inner.store.current().is_leader {
                if let Some(message) = SyncMessage::from_action(&action) {
                    bus.publish(message);
                }
            }
        }

        match action {
            Action::UpdatePrices(updates) => {
                self.record_prices(&updates);
                self.submit_prices(updates);
            }
            other => {
                self.inner.store.apply(other);
            }
        }
    }

    /// Apply a frame received from the leader; never re-published
    pub fn apply_remote(&self, message: SyncMessage) -> bool {
        match message.into_action() {
            Some(action) => {
                if let Action::UpdatePrices(updates) = &action {
                    self.record_prices(updates);
                }
                self.inner.store.apply(action)
            }
            None => false,
        }
    }

    pub fn state(&self) -> Arc<AppState> {
        self.inner.store.current()
    }

    pub fn handle(&self) -> StateHandle {
        self.inner.store.handle()
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    pub fn prices(&self) -> &PriceBuffer {
        &self.inner.prices
    }

    pub fn same_as(&self, other: &Dispatcher) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn submit_prices(&self, updates: PriceUpdates) {
        let updates = match &self.inner.pump {
            Some(pump) => match pump.submit(self.inner.store.current().markets_version, updates) {
                Ok(()) => return,
                Err(returned) => returned,
            },
            None => updates,
        };
        self.inner.store.apply(Action::UpdatePrices(updates));
    }

    fn record_prices(&self, updates: &PriceUpdates) {
        for (symbol, update) in updates.iter() {
            self.inner.prices.write(symbol, update.price);
        }
    }
}

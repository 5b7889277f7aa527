//! Application state store
//!
//! One writer per tab: every mutation goes through [`reduce`] inside
//! [`Store::apply`]. Readers hold a [`StateHandle`] (a `watch` receiver) and
//! are woken only when the reducer produced a new state, so a no-op action
//! never wakes anyone.

pub mod reducer;
pub mod dispatcher;
pub mod price_buffer;

pub use reducer::{reduce, Action, AppState, MergeOutcome};
pub use dispatcher::Dispatcher;
pub use price_buffer::PriceBuffer;

use std::sync::Arc;
use tokio::sync::watch;

/// Owner of the canonical state for one tab
#[derive(Debug, Clone)]
pub struct Store {
    tx: Arc<watch::Sender<Arc<AppState>>>,
}

impl Store {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(AppState::default()));
        Self { tx: Arc::new(tx) }
    }

    /// Run the reducer; returns whether the state object was replaced
    pub fn apply(&self, action: Action) -> bool {
        self.tx.send_if_modified(|state| {
            let next = reduce(state, action);
            if Arc::ptr_eq(state, &next) {
                false
            } else {
                *state = next;
                true
            }
        })
    }

    pub fn current(&self) -> Arc<AppState> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn handle(&self) -> StateHandle {
        StateHandle {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a tab's state
#[derive(Debug, Clone)]
pub struct StateHandle {
    rx: watch::Receiver<Arc<AppState>>,
}

impl StateHandle {
    pub fn current(&self) -> Arc<AppState> {
        Arc::clone(&self.rx.borrow())
    }

    /// Wait for the next state replacement; false once the store is gone
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until `predicate` holds for the current state
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Option<Arc<AppState>>
    where
        F: FnMut(&AppState) -> bool,
    {
        loop {
            let state = Arc::clone(&self.rx.borrow_and_update());
            if predicate(&state) {
                return Some(state);
            }
            if self.rx.changed().await.is_err() {
                return None;
            }
        }
    }
}

// Low-latency last-price slots, written on every tick outside the store

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed set of symbols, one atomic f64 slot each.
///
/// Readers get the freshest price without waiting for a reducer pass. This is
/// a side channel for hot paths only; the store stays the system of record.
#[derive(Debug)]
pub struct PriceBuffer {
    index: HashMap<String, usize>,
    slots: Box<[AtomicU64]>,
}

impl PriceBuffer {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = HashMap::new();
        for symbol in symbols {
            let next = index.len();
            index.entry(symbol.into()).or_insert(next);
        }
        let slots = (0..index.len())
            .map(|_| AtomicU64::new(f64::NAN.to_bits()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { index, slots }
    }

    /// Store the latest price; unknown symbols are ignored
    pub fn write(&self, symbol: &str, price: f64) -> bool {
        match self.index.get(symbol) {
            Some(&slot) => {
                self.slots[slot].store(price.to_bits(), Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Latest price, or `None` if the symbol is unknown or never written
    pub fn read(&self, symbol: &str) -> Option<f64> {
        let slot = *self.index.get(symbol)?;
        let price = f64::from_bits(self.slots[slot].load(Ordering::Acquire));
        (!price.is_nan()).then_some(price)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

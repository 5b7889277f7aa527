// Binance 24hr ticker stream parsing

use crate::core::types::{PriceDirection, PriceUpdate};
use serde_json::Value;
use std::collections::HashMap;

/// One parsed ticker frame
#[derive(Debug, Clone, PartialEq)]
pub struct TickerTick {
    /// Lowercase base+quote, e.g. "btcusdt"
    pub symbol: String,
    pub price: f64,
    pub change24h: f64,
    pub high24h: f64,
    pub low24h: f64,
    /// Quote-asset volume over 24h
    pub volume24h: f64,
}

impl TickerTick {
    pub fn to_update(&self, direction: PriceDirection) -> PriceUpdate {
        PriceUpdate {
            price: self.price,
            change24h: self.change24h,
            high24h: Some(self.high24h),
            low24h: Some(self.low24h),
            volume24h: Some(self.volume24h),
            direction: Some(direction),
        }
    }
}

/// Parse a combined-stream (`{"stream":..,"data":{..}}`) or bare `24hrTicker`
/// frame. Anything else, including subscription acks, yields `None`.
pub fn parse_ticker(text: &str) -> Option<TickerTick> {
    let value: Value = serde_json::from_str(text).ok()?;
    let data = value.get("data").unwrap_or(&value);

    if let Some(event) = data.get("e").and_then(|e| e.as_str()) {
        if event != "24hrTicker" {
            return None;
        }
    }

    let symbol = data.get("s")?.as_str()?.to_lowercase();
    if symbol.is_empty() {
        return None;
    }

    let price = number_field(data, "c")?;
    if !price.is_finite() || price <= 0.0 {
        return None;
    }

    Some(TickerTick {
        symbol,
        price,
        change24h: number_field(data, "P").unwrap_or(0.0),
        high24h: number_field(data, "h").unwrap_or(price),
        low24h: number_field(data, "l").unwrap_or(price),
        volume24h: number_field(data, "q").unwrap_or(0.0),
    })
}

// Binance sends decimals as strings; accept plain numbers too
fn number_field(data: &Value, key: &str) -> Option<f64> {
    match data.get(key)? {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Tick-to-tick direction per symbol
#[derive(Debug, Default)]
pub struct DirectionTracker {
    last: HashMap<String, f64>,
}

impl DirectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, symbol: &str, price: f64) -> PriceDirection {
        let direction = match self.last.get(symbol) {
            Some(&previous) if price > previous => PriceDirection::Up,
            Some(&previous) if price < previous => PriceDirection::Down,
            _ => PriceDirection::Neutral,
        };
        self.last.insert(symbol.to_string(), price);
        direction
    }
}

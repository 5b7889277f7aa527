// Domain types shared by the store, the merge worker and the sync bus

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Direction of the last tick relative to the asset's own previous price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    Up,
    Down,
    #[default]
    Neutral,
}

/// One tracked instrument as shown on the dashboard
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Asset {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change24h: f64,
    pub change7d: f64,
    pub change30d: f64,
    pub market_cap: f64,
    pub volume24h: f64,
    pub high24h: f64,
    pub low24h: f64,
    pub circulating_supply: f64,
    pub total_supply: Option<f64>,
    pub ath: f64,
    pub ath_date: String,
    pub rank: u32,
    pub image: String,
    pub sparkline: Vec<f64>,
    pub last_updated: String,
    pub price_direction: PriceDirection,
}

impl Asset {
    /// Join key used by incremental ticks: lowercase symbol + "usdt"
    pub fn symbol_key(&self) -> String {
        format!("{}usdt", self.symbol.to_lowercase())
    }
}

/// The in-memory asset collection.
///
/// Both the list and each entry are reference counted so that "unchanged"
/// can be checked with `Arc::ptr_eq` instead of a deep comparison.
pub type AssetList = Arc<[Arc<Asset>]>;

pub fn asset_list(assets: Vec<Asset>) -> AssetList {
    assets.into_iter().map(Arc::new).collect()
}

/// One tick for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub price: f64,
    pub change24h: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high24h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low24h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume24h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<PriceDirection>,
}

impl PriceUpdate {
    pub fn new(price: f64, change24h: f64) -> Self {
        Self {
            price,
            change24h,
            ..Default::default()
        }
    }

    pub fn with_direction(mut self, direction: PriceDirection) -> Self {
        self.direction = Some(direction);
        self
    }
}

/// Batch of ticks keyed by symbol key ("btcusdt").
///
/// Inserting a key twice keeps the later tick, which is what coalescing
/// several queued batches in receipt order requires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceUpdates(HashMap<String, PriceUpdate>);

impl PriceUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(key: impl Into<String>, update: PriceUpdate) -> Self {
        let mut updates = Self::new();
        updates.insert(key, update);
        updates
    }

    pub fn insert(&mut self, key: impl Into<String>, update: PriceUpdate) {
        self.0.insert(key.into(), update);
    }

    /// Fold a later batch into this one
    pub fn absorb(&mut self, later: PriceUpdates) {
        self.0.extend(later.0);
    }

    pub fn get(&self, key: &str) -> Option<&PriceUpdate> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PriceUpdate)> {
        self.0.iter()
    }
}

impl FromIterator<(String, PriceUpdate)> for PriceUpdates {
    fn from_iter<I: IntoIterator<Item = (String, PriceUpdate)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Aggregate market snapshot, replaced wholesale on refresh
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalData {
    pub total_mcap: f64,
    pub total_volume: f64,
    pub btc_dominance: f64,
    pub eth_dominance: f64,
    pub active_currencies: u64,
    pub mcap_change24h: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FearGreedData {
    /// 0-100
    pub value: u8,
    pub label: String,
}

impl Default for FearGreedData {
    fn default() -> Self {
        Self {
            value: 50,
            label: "Neutral".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WsStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
}

/// Coarse market mood, ordered from most bearish to most bullish
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketRegime {
    Bear,
    #[default]
    Crab,
    Bull,
    Surge,
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MarketRegime::Bear => "BEAR",
            MarketRegime::Crab => "CRAB",
            MarketRegime::Bull => "BULL",
            MarketRegime::Surge => "SURGE",
        };
        f.write_str(label)
    }
}

/// Trading bias, ordered from STRONG_SELL to STRONG_BUY
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AiSignal {
    StrongSell,
    Sell,
    #[default]
    Neutral,
    Buy,
    StrongBuy,
}

impl fmt::Display for AiSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AiSignal::StrongSell => "STRONG_SELL",
            AiSignal::Sell => "SELL",
            AiSignal::Neutral => "NEUTRAL",
            AiSignal::Buy => "BUY",
            AiSignal::StrongBuy => "STRONG_BUY",
        };
        f.write_str(label)
    }
}

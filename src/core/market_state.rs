// Market regime and signal classification over the whole asset list

use crate::core::types::{AiSignal, Asset, MarketRegime};
use std::sync::Arc;

// Regime thresholds, in percent
const SURGE_AVG: f64 = 5.0;
const BULL_AVG: f64 = 1.5;
const BULL_BREADTH: f64 = 0.55;
const BEAR_AVG: f64 = -1.5;
const BEAR_BREADTH: f64 = 0.45;

// Signal thresholds on the blended score
const SHORT_TERM_WEIGHT: f64 = 0.6;
const MEDIUM_TERM_WEIGHT: f64 = 0.4;
const STRONG_BUY_SCORE: f64 = 5.0;
const BUY_SCORE: f64 = 1.5;
const SELL_SCORE: f64 = -1.5;
const STRONG_SELL_SCORE: f64 = -5.0;

/// Aggregate change statistics the classifiers are derived from
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MarketSnapshot {
    pub count: usize,
    pub avg_change_24h: f64,
    pub avg_change_7d: f64,
    /// Fraction of assets with a positive 24h change
    pub breadth: f64,
    pub advancers: usize,
    pub decliners: usize,
}

impl MarketSnapshot {
    pub fn from_assets(assets: &[Arc<Asset>]) -> Self {
        if assets.is_empty() {
            return Self::default();
        }

        let count = assets.len();
        let mut sum_24h = 0.0;
        let mut sum_7d = 0.0;
        let mut advancers = 0;
        let mut decliners = 0;

        for asset in assets {
            let change_24h = finite_or_zero(asset.change24h);
            sum_24h += change_24h;
            sum_7d += finite_or_zero(asset.change7d);

            if change_24h > 0.0 {
                advancers += 1;
            } else if change_24h < 0.0 {
                decliners += 1;
            }
        }

        Self {
            count,
            avg_change_24h: sum_24h / count as f64,
            avg_change_7d: sum_7d / count as f64,
            breadth: advancers as f64 / count as f64,
            advancers,
            decliners,
        }
    }

    pub fn regime(&self) -> MarketRegime {
        if self.count == 0 {
            return MarketRegime::default();
        }

        let avg = self.avg_change_24h;
        if avg > SURGE_AVG {
            MarketRegime::Surge
        } else if avg >= BULL_AVG && self.breadth > BULL_BREADTH {
            MarketRegime::Bull
        } else if avg < BEAR_AVG && self.breadth < BEAR_BREADTH {
            MarketRegime::Bear
        } else {
            MarketRegime::Crab
        }
    }

    pub fn signal(&self) -> AiSignal {
        if self.count == 0 {
            return AiSignal::Neutral;
        }

        let score = SHORT_TERM_WEIGHT * self.avg_change_24h + MEDIUM_TERM_WEIGHT * self.avg_change_7d;
        if score >= STRONG_BUY_SCORE {
            AiSignal::StrongBuy
        } else if score >= BUY_SCORE {
            AiSignal::Buy
        } else if score > SELL_SCORE {
            AiSignal::Neutral
        } else if score > STRONG_SELL_SCORE {
            AiSignal::Sell
        } else {
            AiSignal::StrongSell
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Bucket the 24h change distribution into a market regime
pub fn detect_regime(assets: &[Arc<Asset>]) -> MarketRegime {
    MarketSnapshot::from_assets(assets).regime()
}

/// Blend 24h and 7d average change into a trading bias
pub fn compute_signal(assets: &[Arc<Asset>]) -> AiSignal {
    MarketSnapshot::from_assets(assets).signal()
}

/// Both classifications from a single pass over the list
pub fn classify(assets: &[Arc<Asset>]) -> (MarketRegime, AiSignal) {
    let snapshot = MarketSnapshot::from_assets(assets);
    (snapshot.regime(), snapshot.signal())
}

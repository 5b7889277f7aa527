// Core market logic: data model, tick merge, classification, task lifecycle

pub mod types;
pub mod merge;
pub mod market_state;
pub mod recovery;

// Re-export commonly used types
pub use types::{
    asset_list, AiSignal, Asset, AssetList, FearGreedData, GlobalData, MarketRegime,
    PriceDirection, PriceUpdate, PriceUpdates, WsStatus,
};
pub use merge::merge_ticks;
pub use market_state::{classify, compute_signal, detect_regime, MarketSnapshot};
pub use recovery::{ReconnectPolicy, Shutdown};

// Market Sync Library
//
// Multi-tab coordinated market data: one elected tab streams and polls the
// upstream sources, every tab shares the resulting state over a sync bus

pub mod core;
pub mod config;
pub mod error;       // Unified error handling
pub mod store;       // Reducer, state handles, enhanced dispatch
pub mod offload;     // Background tick merging
pub mod sync;        // Cross-tab bus and leader election
pub mod feed;        // Leader-only upstream feed
pub mod db;          // SQLite price history and warm-start cache
pub mod app;

// Re-export core market types
pub use core::{
    AiSignal, Asset, AssetList, FearGreedData, GlobalData, MarketRegime, PriceDirection,
    PriceUpdate, PriceUpdates, WsStatus,
};

// Re-export error types
pub use error::{SyncError, SyncResult};

// Re-export configuration
pub use config::{Config, ConfigError, ElectionConfig, FeedConfig, LoggingConfig, OffloadConfig, StorageConfig};

pub use store::{Action, AppState, Dispatcher, StateHandle, Store};
pub use offload::{MergeOffload, OffloadMode};
pub use sync::{SyncHub, SyncMessage, TabId};
pub use feed::{FeedHandle, FeedOrchestrator};
pub use db::{Database, PriceHistory, StateCache};
pub use app::Tab;

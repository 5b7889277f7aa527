// Upstream data sources driven by the leader tab

pub mod ticker;
pub mod rest;
pub mod orchestrator;

pub use orchestrator::{supervise_stream, FeedHandle, FeedOrchestrator, SessionReport, StreamExit};
pub use rest::MarketApi;
pub use ticker::{parse_ticker, DirectionTracker, TickerTick};

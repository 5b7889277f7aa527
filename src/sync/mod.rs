// Cross-tab leader election and state replication

pub mod tab_id;
pub mod protocol;
pub mod hub;
pub mod election;

pub use tab_id::TabId;
pub use protocol::{Envelope, SyncMessage};
pub use hub::{BusSender, SyncBus, SyncHub};
pub use election::{ElectionEffect, ElectionState, LeaderElection};

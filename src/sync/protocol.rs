//! Cross-tab message catalogue
//!
//! Frames are serde-tagged with the SCREAMING_SNAKE_CASE names the dashboard
//! tabs have always used on the wire (`CLAIM_LEADER`, `PRICE_UPDATE`, ...),
//! so a frame can be logged or persisted as plain JSON.

use crate::core::types::{AssetList, FearGreedData, GlobalData, PriceUpdates, WsStatus};
use crate::store::Action;
use crate::sync::tab_id::TabId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncMessage {
    ClaimLeader { tab_id: TabId },
    LeaderAck { tab_id: TabId },
    PriceUpdate { updates: PriceUpdates },
    MarketUpdate { assets: AssetList },
    GlobalUpdate { data: GlobalData },
    FngUpdate { data: FearGreedData },
    WsStatus { status: WsStatus },
    TabPing { tab_id: TabId },
    TabPong { tab_id: TabId },
}

impl SyncMessage {
    /// Mirror of a leader-originated store action, if followers need it
    pub fn from_action(action: &Action) -> Option<Self> {
        match action {
            Action::UpdatePrices(updates) => Some(SyncMessage::PriceUpdate {
                updates: updates.clone(),
            }),
            Action::UpdateMarkets(assets) => Some(SyncMessage::MarketUpdate {
                assets: assets.clone(),
            }),
            Action::UpdateGlobal(data) => Some(SyncMessage::GlobalUpdate { data: data.clone() }),
            Action::UpdateFearGreed(data) => Some(SyncMessage::FngUpdate { data: data.clone() }),
            Action::SetWsStatus(status) => Some(SyncMessage::WsStatus { status: *status }),
            Action::SetLoading(_)
            | Action::SetError(_)
            | Action::SetLeader(_)
            | Action::SetTabCount(_)
            | Action::MergeResult(_) => None,
        }
    }

    /// The store action a follower applies for this frame
    pub fn into_action(self) -> Option<Action> {
        match self {
            SyncMessage::PriceUpdate { updates } => Some(Action::UpdatePrices(updates)),
            SyncMessage::MarketUpdate { assets } => Some(Action::UpdateMarkets(assets)),
            SyncMessage::GlobalUpdate { data } => Some(Action::UpdateGlobal(data)),
            SyncMessage::FngUpdate { data } => Some(Action::UpdateFearGreed(data)),
            SyncMessage::WsStatus { status } => Some(Action::SetWsStatus(status)),
            SyncMessage::ClaimLeader { .. }
            | SyncMessage::LeaderAck { .. }
            | SyncMessage::TabPing { .. }
            | SyncMessage::TabPong { .. } => None,
        }
    }

    pub fn is_election(&self) -> bool {
        matches!(
            self,
            SyncMessage::ClaimLeader { .. }
                | SyncMessage::LeaderAck { .. }
                | SyncMessage::TabPing { .. }
                | SyncMessage::TabPong { .. }
        )
    }
}

/// One frame on the bus, stamped with the sending tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: TabId,
    pub message: SyncMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PriceUpdate;

    #[test]
    fn test_wire_names() {
        let msg = SyncMessage::ClaimLeader {
            tab_id: TabId::from("1700000000000-abc"),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"CLAIM_LEADER\""));

        let msg = SyncMessage::WsStatus {
            status: WsStatus::Reconnecting,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"WS_STATUS","status":"reconnecting"}"#);

        let msg = SyncMessage::FngUpdate {
            data: FearGreedData::default(),
        };
        assert!(serde_json::to_string(&msg).unwrap().contains("FNG_UPDATE"));
    }

    #[test]
    fn test_local_only_actions_are_not_broadcast() {
        assert!(SyncMessage::from_action(&Action::SetLeader(true)).is_none());
        assert!(SyncMessage::from_action(&Action::SetTabCount(3)).is_none());
        assert!(SyncMessage::from_action(&Action::SetError(None)).is_none());
    }

    #[test]
    fn test_price_frame_maps_back_to_action() {
        let updates = PriceUpdates::single("btcusdt", PriceUpdate::new(1.0, 0.1));
        let msg = SyncMessage::from_action(&Action::UpdatePrices(updates.clone())).unwrap();

        match msg.into_action() {
            Some(Action::UpdatePrices(received)) => assert_eq!(received, updates),
            other => panic!("unexpected action: {:?}", other),
        }
    }
}

//! Leader election between tabs
//!
//! Pure state machine: inputs are "start", "claim timer fired" and bus
//! frames; outputs are [`ElectionEffect`]s the tab driver carries out. No
//! I/O or timers live here, which keeps every ordering scenario testable by
//! feeding frames by hand.
//!
//! Protocol summary:
//! - without a transport the tab leads immediately;
//! - otherwise it sends `TAB_PING` and claims after `claim_delay` unless a
//!   foreign `CLAIM_LEADER` arrived first;
//! - a settled leader that sees a newer foreign `CLAIM_LEADER` concedes with
//!   `LEADER_ACK`; receiving an ack never demotes anyone.
//!
//! A freshly promoted tab counts as settled once its own claim comes back
//! through the channel. Foreign claims that arrive before that echo were sent
//! earlier, and their sender will concede when it sees ours. Between
//! promotion and the other side's concession two tabs can both lead; that
//! window is accepted. There is no departure frame and no heartbeat, so a
//! closed leader is not replaced until another tab runs an election.

use crate::sync::protocol::SyncMessage;
use crate::sync::tab_id::TabId;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionState {
    Unknown,
    Claiming,
    Leader,
    Follower,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElectionEffect {
    Broadcast(SyncMessage),
    ScheduleClaim(Duration),
    BecameLeader,
    SteppedDown,
    TabCountChanged(usize),
}

#[derive(Debug)]
pub struct LeaderElection {
    tab_id: TabId,
    state: ElectionState,
    claim_delay: Duration,
    claim_echoed: bool,
    peers: HashSet<TabId>,
}

impl LeaderElection {
    pub fn new(tab_id: TabId, claim_delay: Duration) -> Self {
        Self {
            tab_id,
            state: ElectionState::Unknown,
            claim_delay,
            claim_echoed: false,
            peers: HashSet::new(),
        }
    }

    pub fn state(&self) -> ElectionState {
        self.state
    }

    pub fn is_leader(&self) -> bool {
        self.state == ElectionState::Leader
    }

    pub fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    /// Best-effort estimate: this tab plus every peer ever heard from
    pub fn tab_count(&self) -> usize {
        1 + self.peers.len()
    }

    pub fn start(&mut self, transport_available: bool) -> Vec<ElectionEffect> {
        if self.state != ElectionState::Unknown {
            return Vec::new();
        }

        if !transport_available {
            // Single-tab assumption: nobody to coordinate with
            self.state = ElectionState::Leader;
            self.claim_echoed = true;
            return vec![ElectionEffect::BecameLeader];
        }

        self.state = ElectionState::Claiming;
        vec![
            ElectionEffect::Broadcast(SyncMessage::TabPing {
                tab_id: self.tab_id.clone(),
            }),
            ElectionEffect::ScheduleClaim(self.claim_delay),
        ]
    }

    pub fn on_claim_timer(&mut self) -> Vec<ElectionEffect> {
        if self.state != ElectionState::Claiming {
            return Vec::new();
        }

        self.state = ElectionState::Leader;
        self.claim_echoed = false;
        vec![
            ElectionEffect::BecameLeader,
            ElectionEffect::Broadcast(SyncMessage::ClaimLeader {
                tab_id: self.tab_id.clone(),
            }),
        ]
    }

    pub fn on_message(&mut self, from: &TabId, message: &SyncMessage) -> Vec<ElectionEffect> {
        if self.state == ElectionState::Unknown {
            return Vec::new();
        }

        if *from == self.tab_id {
            if matches!(message, SyncMessage::ClaimLeader { .. }) && self.state == ElectionState::Leader {
                self.claim_echoed = true;
            }
            return Vec::new();
        }

        match message {
            SyncMessage::ClaimLeader { .. } => self.on_foreign_claim(from),
            SyncMessage::TabPing { .. } => {
                let mut effects = vec![ElectionEffect::Broadcast(SyncMessage::TabPong {
                    tab_id: self.tab_id.clone(),
                })];
                effects.extend(self.note_peer(from));
                effects
            }
            SyncMessage::TabPong { .. } | SyncMessage::LeaderAck { .. } => self.note_peer(from),
            _ => Vec::new(),
        }
    }

    fn on_foreign_claim(&mut self, from: &TabId) -> Vec<ElectionEffect> {
        let mut effects = self.note_peer(from);

        match self.state {
            ElectionState::Claiming => {
                self.state = ElectionState::Follower;
            }
            ElectionState::Leader if self.claim_echoed => {
                self.state = ElectionState::Follower;
                effects.push(ElectionEffect::SteppedDown);
                effects.push(ElectionEffect::Broadcast(SyncMessage::LeaderAck {
                    tab_id: self.tab_id.clone(),
                }));
            }
            // Claim predates ours; its sender concedes once it sees our claim
            ElectionState::Leader => {}
            ElectionState::Follower | ElectionState::Unknown => {}
        }

        effects
    }

    fn note_peer(&mut self, from: &TabId) -> Vec<ElectionEffect> {
        if self.peers.insert(from.clone()) {
            vec![ElectionEffect::TabCountChanged(self.tab_count())]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn election(id: &str) -> LeaderElection {
        LeaderElection::new(TabId::from(id), Duration::from_millis(300))
    }

    fn claim(id: &str) -> SyncMessage {
        SyncMessage::ClaimLeader { tab_id: TabId::from(id) }
    }

    #[test]
    fn test_without_transport_leads_immediately() {
        let mut tab = election("solo");
        let effects = tab.start(false);
        assert_eq!(effects, vec![ElectionEffect::BecameLeader]);
        assert!(tab.is_leader());
    }

    #[test]
    fn test_start_pings_and_schedules_claim() {
        let mut tab = election("a");
        let effects = tab.start(true);
        assert_eq!(tab.state(), ElectionState::Claiming);
        assert!(matches!(effects[0], ElectionEffect::Broadcast(SyncMessage::TabPing { .. })));
        assert_eq!(effects[1], ElectionEffect::ScheduleClaim(Duration::from_millis(300)));
    }

    #[test]
    fn test_foreign_claim_while_claiming_cancels_promotion() {
        let mut tab = election("b");
        tab.start(true);
        tab.on_message(&TabId::from("a"), &claim("a"));
        assert_eq!(tab.state(), ElectionState::Follower);
        assert!(tab.on_claim_timer().is_empty());
        assert!(!tab.is_leader());
    }

    #[test]
    fn test_ack_never_demotes() {
        let mut tab = election("b");
        tab.start(true);
        tab.on_claim_timer();
        tab.on_message(&TabId::from("b"), &claim("b"));

        let ack = SyncMessage::LeaderAck { tab_id: TabId::from("a") };
        tab.on_message(&TabId::from("a"), &ack);
        assert!(tab.is_leader());
    }

    #[test]
    fn test_ping_is_answered_and_counted_once() {
        let mut tab = election("a");
        tab.start(true);

        let ping = SyncMessage::TabPing { tab_id: TabId::from("b") };
        let effects = tab.on_message(&TabId::from("b"), &ping);
        assert!(effects.contains(&ElectionEffect::TabCountChanged(2)));
        assert!(effects
            .iter()
            .any(|e| matches!(e, ElectionEffect::Broadcast(SyncMessage::TabPong { .. }))));

        let effects = tab.on_message(&TabId::from("b"), &ping);
        assert!(!effects.iter().any(|e| matches!(e, ElectionEffect::TabCountChanged(_))));
        assert_eq!(tab.tab_count(), 2);
    }
}

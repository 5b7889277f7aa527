// Application state and the single reducer that mutates it

use crate::core::market_state::classify;
use crate::core::merge::merge_ticks;
use crate::core::types::{
    AiSignal, Asset, AssetList, FearGreedData, GlobalData, MarketRegime, PriceDirection,
    PriceUpdates, WsStatus,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub ws_status: WsStatus,
    pub assets: AssetList,
    /// Bumped on every change to `assets`; lets offloaded merges detect staleness
    pub assets_version: u64,
    /// Bumped only by full refreshes; ticks stamped with an older value are void
    pub markets_version: u64,
    pub global: Option<GlobalData>,
    pub fear_greed: Option<FearGreedData>,
    pub regime: MarketRegime,
    pub signal: AiSignal,
    pub loading: bool,
    pub error: Option<String>,
    pub is_leader: bool,
    pub tab_count: usize,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            ws_status: WsStatus::Connecting,
            assets: Arc::from(Vec::new()),
            assets_version: 0,
            markets_version: 0,
            global: None,
            fear_greed: None,
            regime: MarketRegime::default(),
            signal: AiSignal::default(),
            loading: true,
            error: None,
            is_leader: false,
            tab_count: 1,
        }
    }
}

/// Result of a merge computed off the store, plus what it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub seq: u64,
    pub base_version: u64,
    pub markets_version: u64,
    pub assets: AssetList,
    pub regime: MarketRegime,
    pub signal: AiSignal,
    /// The batch itself, re-applied inline if `base_version` went stale but
    /// no refresh landed in between
    pub updates: PriceUpdates,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    UpdatePrices(PriceUpdates),
    UpdateMarkets(AssetList),
    UpdateGlobal(GlobalData),
    UpdateFearGreed(FearGreedData),
    SetLoading(bool),
    SetError(Option<String>),
    SetWsStatus(WsStatus),
    SetLeader(bool),
    SetTabCount(usize),
    MergeResult(MergeOutcome),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::UpdatePrices(_) => "UPDATE_PRICES",
            Action::UpdateMarkets(_) => "UPDATE_MARKETS",
            Action::UpdateGlobal(_) => "UPDATE_GLOBAL",
            Action::UpdateFearGreed(_) => "UPDATE_FNG",
            Action::SetLoading(_) => "SET_LOADING",
            Action::SetError(_) => "SET_ERROR",
            Action::SetWsStatus(_) => "SET_WS_STATUS",
            Action::SetLeader(_) => "SET_LEADER",
            Action::SetTabCount(_) => "SET_TAB_COUNT",
            Action::MergeResult(_) => "MERGE_RESULT",
        }
    }
}

/// Pure reducer. Returns the very same `Arc` when the action changes nothing.
pub fn reduce(state: &Arc<AppState>, action: Action) -> Arc<AppState> {
    match action {
        Action::UpdatePrices(updates) => apply_ticks(state, &updates),

        Action::UpdateMarkets(assets) => {
            let assets = reset_directions(assets);
            let (regime, signal) = classify(&assets);
            Arc::new(AppState {
                assets,
                assets_version: state.assets_version + 1,
                markets_version: state.markets_version + 1,
                regime,
                signal,
                loading: false,
                error: None,
                ..AppState::clone(state)
            })
        }

        Action::MergeResult(outcome) => {
            if outcome.markets_version != state.markets_version {
                // A full refresh superseded these ticks
                return Arc::clone(state);
            }
            if outcome.base_version != state.assets_version {
                // The collection moved on while the worker was busy
                return apply_ticks(state, &outcome.updates);
            }
            if Arc::ptr_eq(&outcome.assets, &state.assets) {
                return Arc::clone(state);
            }
            Arc::new(AppState {
                assets: outcome.assets,
                assets_version: state.assets_version + 1,
                regime: outcome.regime,
                signal: outcome.signal,
                ..AppState::clone(state)
            })
        }

        Action::UpdateGlobal(data) => {
            if state.global.as_ref() == Some(&data) {
                return Arc::clone(state);
            }
            Arc::new(AppState {
                global: Some(data),
                ..AppState::clone(state)
            })
        }

        Action::UpdateFearGreed(data) => {
            if state.fear_greed.as_ref() == Some(&data) {
                return Arc::clone(state);
            }
            Arc::new(AppState {
                fear_greed: Some(data),
                ..AppState::clone(state)
            })
        }

        Action::SetLoading(loading) => update_if(state, state.loading != loading, |s| s.loading = loading),
        Action::SetError(error) => {
            let changed = state.error != error;
            update_if(state, changed, |s| s.error = error)
        }
        Action::SetWsStatus(status) => update_if(state, state.ws_status != status, |s| s.ws_status = status),
        Action::SetLeader(is_leader) => {
            update_if(state, state.is_leader != is_leader, |s| s.is_leader = is_leader)
        }
        Action::SetTabCount(count) => update_if(state, state.tab_count != count, |s| s.tab_count = count),
    }
}

fn apply_ticks(state: &Arc<AppState>, updates: &PriceUpdates) -> Arc<AppState> {
    let merged = merge_ticks(&state.assets, updates);
    if Arc::ptr_eq(&merged, &state.assets) {
        return Arc::clone(state);
    }

    let (regime, signal) = classify(&merged);
    Arc::new(AppState {
        assets: merged,
        assets_version: state.assets_version + 1,
        regime,
        signal,
        ..AppState::clone(state)
    })
}

fn update_if(state: &Arc<AppState>, changed: bool, edit: impl FnOnce(&mut AppState)) -> Arc<AppState> {
    if !changed {
        return Arc::clone(state);
    }
    let mut next = AppState::clone(state);
    edit(&mut next);
    Arc::new(next)
}

/// A full refresh starts every asset from a neutral direction
fn reset_directions(assets: AssetList) -> AssetList {
    if assets.iter().all(|a| a.price_direction == PriceDirection::Neutral) {
        return assets;
    }
    assets
        .iter()
        .map(|asset| {
            if asset.price_direction == PriceDirection::Neutral {
                Arc::clone(asset)
            } else {
                Arc::new(Asset {
                    price_direction: PriceDirection::Neutral,
                    ..Asset::clone(asset)
                })
            }
        })
        .collect()
}

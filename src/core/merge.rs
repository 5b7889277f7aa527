// Tick merge: positional rewrite of the asset list from a batch of ticks

use crate::core::types::{Asset, AssetList, PriceUpdates};
use std::sync::Arc;

/// Apply a batch of ticks to the asset list.
///
/// Only assets whose symbol key is present in `updates` are replaced; every
/// other entry keeps its `Arc`. When nothing matches, the input list itself
/// is returned so callers can detect the no-op with `Arc::ptr_eq`.
/// Ticks for unknown symbols are ignored.
pub fn merge_ticks(assets: &AssetList, updates: &PriceUpdates) -> AssetList {
    if updates.is_empty() {
        return Arc::clone(assets);
    }

    let mut changed = false;
    let merged: Vec<Arc<Asset>> = assets
        .iter()
        .map(|asset| match updates.get(&asset.symbol_key()) {
            Some(update) => {
                changed = true;
                Arc::new(Asset {
                    price: update.price,
                    change24h: update.change24h,
                    price_direction: update.direction.unwrap_or_default(),
                    high24h: update.high24h.unwrap_or(asset.high24h),
                    low24h: update.low24h.unwrap_or(asset.low24h),
                    volume24h: update.volume24h.unwrap_or(asset.volume24h),
                    ..Asset::clone(asset)
                })
            }
            None => Arc::clone(asset),
        })
        .collect();

    if changed {
        merged.into()
    } else {
        Arc::clone(assets)
    }
}

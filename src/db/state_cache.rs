//! Last full market list, kept so a new tab has something to show at once

use crate::core::types::{Asset, AssetList};
use crate::db::Database;
use crate::error::SyncResult;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

const MARKETS_KEY: &str = "markets";

#[derive(Debug, Clone)]
pub struct StateCache {
    db: Database,
}

impl StateCache {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn save_assets(&self, assets: &AssetList) -> SyncResult<()> {
        let payload = serde_json::to_string(&assets[..])?;
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO state_cache (key, payload, updated_at)
             VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
             ON CONFLICT(key) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
            params![MARKETS_KEY, payload],
        )?;
        Ok(())
    }

    /// `None` when nothing was cached yet
    pub fn load_assets(&self) -> SyncResult<Option<AssetList>> {
        let payload: Option<String> = {
            let conn = self.db.lock()?;
            let row = conn
                .query_row(
                    "SELECT payload FROM state_cache WHERE key = ?1",
                    params![MARKETS_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            row
        };

        match payload {
            Some(payload) => {
                let assets: Vec<Asset> = serde_json::from_str(&payload)?;
                Ok(Some(assets.into_iter().map(Arc::new).collect()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::asset_list;

    #[test]
    fn test_cache_replaces_previous_snapshot() {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();
        let cache = StateCache::new(db);

        assert!(cache.load_assets().unwrap().is_none());

        let first = asset_list(vec![Asset {
            id: "bitcoin".to_string(),
            symbol: "BTC".to_string(),
            price: 1.0,
            ..Default::default()
        }]);
        cache.save_assets(&first).unwrap();

        let second = asset_list(vec![Asset {
            id: "ethereum".to_string(),
            symbol: "ETH".to_string(),
            price: 2.0,
            ..Default::default()
        }]);
        cache.save_assets(&second).unwrap();

        let loaded = cache.load_assets().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "ethereum");
    }
}

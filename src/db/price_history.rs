//! Rolling per-symbol price history

use crate::db::Database;
use crate::error::SyncResult;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub symbol: String,
    pub price: f64,
    pub recorded_at: String,
}

impl PricePoint {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PricePoint {
            symbol: row.get(0)?,
            price: row.get(1)?,
            recorded_at: row.get(2)?,
        })
    }
}

/// Keeps the newest `history_len` prices per symbol
#[derive(Debug, Clone)]
pub struct PriceHistory {
    db: Database,
    history_len: usize,
}

impl PriceHistory {
    pub fn new(db: Database, history_len: usize) -> Self {
        Self {
            db,
            history_len: history_len.max(1),
        }
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }

    /// Append a price and drop everything older than the window
    pub fn save(&self, symbol: &str, price: f64) -> SyncResult<()> {
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO price_history (symbol, price) VALUES (?1, ?2)",
            params![symbol, price],
        )?;
        conn.execute(
            "DELETE FROM price_history
             WHERE symbol = ?1 AND id NOT IN (
                 SELECT id FROM price_history WHERE symbol = ?1 ORDER BY id DESC LIMIT ?2
             )",
            params![symbol, self.history_len as i64],
        )?;
        Ok(())
    }

    /// Storage problems never interrupt the feed
    pub fn save_best_effort(&self, symbol: &str, price: f64) {
        if let Err(e) = self.save(symbol, price) {
            debug!("price history write for {} skipped: {}", symbol, e);
        }
    }

    /// Up to `count` most recent points, oldest first
    pub fn load_recent(&self, symbol: &str, count: usize) -> SyncResult<Vec<PricePoint>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT symbol, price, recorded_at FROM (
                 SELECT id, symbol, price, recorded_at FROM price_history
                 WHERE symbol = ?1 ORDER BY id DESC LIMIT ?2
             ) ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![symbol, count as i64], |row| PricePoint::from_row(row))?;
        let points = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(points)
    }
}

/// Hands ticks to a single blocking-pool task that owns the SQLite writes,
/// so the stream loop never waits on disk. Writes keep submission order.
/// The task drains its queue and exits once every writer is dropped.
#[derive(Debug, Clone)]
pub struct HistoryWriter {
    tx: mpsc::UnboundedSender<(String, f64)>,
}

impl HistoryWriter {
    pub fn spawn(history: PriceHistory) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, f64)>();
        let task = tokio::task::spawn_blocking(move || {
            while let Some((symbol, price)) = rx.blocking_recv() {
                history.save_best_effort(&symbol, price);
            }
        });
        (Self { tx }, task)
    }

    pub fn record(&self, symbol: &str, price: f64) {
        if self.tx.send((symbol.to_string(), price)).is_err() {
            debug!("price history writer gone, dropping {} tick", symbol);
        }
    }
}

// REST snapshots: market list, global stats, fear/greed index

use crate::config::FeedConfig;
use crate::core::types::{Asset, AssetList, FearGreedData, GlobalData};
use crate::error::{SyncError, SyncResult};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Client for the three polled snapshots.
///
/// Each fetch tries the same-origin proxy first (when configured) and then
/// the public upstream. Both hops run under a single timeout; a timeout or a
/// second failure is returned to the poller, which waits for its next tick.
#[derive(Debug, Clone)]
pub struct MarketApi {
    client: reqwest::Client,
    proxy_base_url: Option<String>,
    upstream_base_url: String,
    fear_greed_url: String,
    markets_per_page: usize,
    timeout: Duration,
}

impl MarketApi {
    pub fn new(config: &FeedConfig) -> Self {
        let proxy = config.proxy_base_url.trim_end_matches('/');
        Self {
            client: reqwest::Client::new(),
            proxy_base_url: (!proxy.is_empty()).then(|| proxy.to_string()),
            upstream_base_url: config.upstream_base_url.trim_end_matches('/').to_string(),
            fear_greed_url: config.fear_greed_url.clone(),
            markets_per_page: config.markets_per_page,
            timeout: Duration::from_millis(config.rest_timeout_ms),
        }
    }

    /// Full market list, ranked by market cap
    pub async fn markets(&self) -> SyncResult<AssetList> {
        let query = [
            ("vs_currency", "usd".to_string()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", self.markets_per_page.to_string()),
            ("page", "1".to_string()),
            ("sparkline", "true".to_string()),
            ("price_change_percentage", "24h,7d,30d".to_string()),
        ];
        let mut urls = Vec::new();
        if let Some(proxy) = &self.proxy_base_url {
            urls.push(format!("{}/coins/markets", proxy));
        }
        urls.push(format!("{}/coins/markets", self.upstream_base_url));

        let body = self.fetch_with_fallback("markets", &urls, &query).await?;
        let rows: Vec<CoinMarket> = serde_json::from_value(body)
            .map_err(|e| SyncError::ApiDecode(format!("markets payload: {}", e)))?;

        Ok(rows.into_iter().map(|row| Arc::new(row.into_asset())).collect())
    }

    pub async fn global(&self) -> SyncResult<GlobalData> {
        let mut urls = Vec::new();
        if let Some(proxy) = &self.proxy_base_url {
            urls.push(format!("{}/global", proxy));
        }
        urls.push(format!("{}/global", self.upstream_base_url));

        let body = self.fetch_with_fallback("global", &urls, &[]).await?;
        let envelope: GlobalEnvelope = serde_json::from_value(body)
            .map_err(|e| SyncError::ApiDecode(format!("global payload: {}", e)))?;

        Ok(envelope.data.into_global())
    }

    pub async fn fear_greed(&self) -> SyncResult<FearGreedData> {
        let mut urls = Vec::new();
        if let Some(proxy) = &self.proxy_base_url {
            urls.push(format!("{}/fng?limit=1", proxy));
        }
        urls.push(self.fear_greed_url.clone());

        let body = self.fetch_with_fallback("fear/greed", &urls, &[]).await?;
        let envelope: FngEnvelope = serde_json::from_value(body)
            .map_err(|e| SyncError::ApiDecode(format!("fear/greed payload: {}", e)))?;

        let entry = envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::ApiDecode("fear/greed payload has no entries".to_string()))?;
        entry.into_fear_greed()
    }

    async fn fetch_with_fallback(
        &self,
        label: &str,
        urls: &[String],
        query: &[(&str, String)],
    ) -> SyncResult<Value> {
        let chain = async {
            let mut last_error = None;
            for url in urls {
                match self.get_json(url, query).await {
                    Ok(body) => return Ok(body),
                    Err(e) => {
                        warn!("⚠️  {} fetch via {} failed: {}", label, url, e);
                        last_error = Some(e);
                    }
                }
            }
            Err(last_error.unwrap_or_else(|| SyncError::ApiConnection(format!("no endpoint for {}", label))))
        };

        match tokio::time::timeout(self.timeout, chain).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::ApiTimeout(format!(
                "{} fetch exceeded {}ms",
                label,
                self.timeout.as_millis()
            ))),
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> SyncResult<Value> {
        debug!("GET {}", url);
        let response = self.client.get(url).query(query).send().await?;

        if !response.status().is_success() {
            return Err(SyncError::ApiResponse(format!(
                "HTTP {} from {}",
                response.status().as_u16(),
                url
            )));
        }

        Ok(response.json::<Value>().await?)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CoinMarket {
    id: String,
    symbol: String,
    name: String,
    image: String,
    current_price: Option<f64>,
    market_cap: Option<f64>,
    market_cap_rank: Option<u32>,
    total_volume: Option<f64>,
    high_24h: Option<f64>,
    low_24h: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    price_change_percentage_7d_in_currency: Option<f64>,
    price_change_percentage_30d_in_currency: Option<f64>,
    circulating_supply: Option<f64>,
    total_supply: Option<f64>,
    ath: Option<f64>,
    ath_date: Option<String>,
    last_updated: Option<String>,
    sparkline_in_7d: Option<Sparkline>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Sparkline {
    price: Vec<f64>,
}

impl CoinMarket {
    fn into_asset(self) -> Asset {
        let price = self.current_price.unwrap_or(0.0);
        Asset {
            id: self.id,
            symbol: self.symbol.to_uppercase(),
            name: self.name,
            price,
            change24h: self.price_change_percentage_24h.unwrap_or(0.0),
            change7d: self.price_change_percentage_7d_in_currency.unwrap_or(0.0),
            change30d: self.price_change_percentage_30d_in_currency.unwrap_or(0.0),
            market_cap: self.market_cap.unwrap_or(0.0),
            volume24h: self.total_volume.unwrap_or(0.0),
            high24h: self.high_24h.unwrap_or(price),
            low24h: self.low_24h.unwrap_or(price),
            circulating_supply: self.circulating_supply.unwrap_or(0.0),
            total_supply: self.total_supply,
            ath: self.ath.unwrap_or(0.0),
            ath_date: self.ath_date.unwrap_or_default(),
            rank: self.market_cap_rank.unwrap_or(0),
            image: self.image,
            sparkline: self.sparkline_in_7d.map(|s| s.price).unwrap_or_default(),
            last_updated: self.last_updated.unwrap_or_default(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct GlobalEnvelope {
    data: GlobalPayload,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GlobalPayload {
    active_cryptocurrencies: u64,
    total_market_cap: HashMap<String, f64>,
    total_volume: HashMap<String, f64>,
    market_cap_percentage: HashMap<String, f64>,
    market_cap_change_percentage_24h_usd: f64,
}

impl GlobalPayload {
    fn into_global(self) -> GlobalData {
        GlobalData {
            total_mcap: self.total_market_cap.get("usd").copied().unwrap_or(0.0),
            total_volume: self.total_volume.get("usd").copied().unwrap_or(0.0),
            btc_dominance: self.market_cap_percentage.get("btc").copied().unwrap_or(0.0),
            eth_dominance: self.market_cap_percentage.get("eth").copied().unwrap_or(0.0),
            active_currencies: self.active_cryptocurrencies,
            mcap_change24h: self.market_cap_change_percentage_24h_usd,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FngEnvelope {
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    value_classification: String,
}

impl FngEntry {
    fn into_fear_greed(self) -> SyncResult<FearGreedData> {
        let value = self
            .value
            .trim()
            .parse::<u8>()
            .map_err(|e| SyncError::ApiDecode(format!("fear/greed value {:?}: {}", self.value, e)))?;
        Ok(FearGreedData {
            value: value.min(100),
            label: self.value_classification,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_market_mapping_tolerates_nulls() {
        let row: CoinMarket = serde_json::from_str(
            r#"{"id":"bitcoin","symbol":"btc","name":"Bitcoin","current_price":64000.5,
                "market_cap_rank":1,"high_24h":null,"total_supply":21000000,
                "sparkline_in_7d":{"price":[1.0,2.0]}}"#,
        )
        .unwrap();
        let asset = row.into_asset();

        assert_eq!(asset.symbol, "BTC");
        assert_eq!(asset.symbol_key(), "btcusdt");
        assert_eq!(asset.high24h, 64000.5);
        assert_eq!(asset.total_supply, Some(21_000_000.0));
        assert_eq!(asset.sparkline, vec![1.0, 2.0]);
        assert_eq!(asset.rank, 1);
    }

    #[test]
    fn test_global_mapping() {
        let envelope: GlobalEnvelope = serde_json::from_str(
            r#"{"data":{"active_cryptocurrencies":12000,
                "total_market_cap":{"usd":2.5e12},"total_volume":{"usd":9.0e10},
                "market_cap_percentage":{"btc":52.1,"eth":16.9},
                "market_cap_change_percentage_24h_usd":-0.8}}"#,
        )
        .unwrap();
        let global = envelope.data.into_global();

        assert_eq!(global.active_currencies, 12_000);
        assert_eq!(global.btc_dominance, 52.1);
        assert_eq!(global.mcap_change24h, -0.8);
    }

    #[test]
    fn test_fear_greed_mapping() {
        let entry = FngEntry {
            value: "72".to_string(),
            value_classification: "Greed".to_string(),
        };
        let data = entry.into_fear_greed().unwrap();
        assert_eq!(data.value, 72);
        assert_eq!(data.label, "Greed");
    }
}

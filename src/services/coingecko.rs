//! CoinGecko market-data gateway.
//!
//! Wraps the two free-tier read endpoints this service depends on:
//! - `/coins/markets`: bulk market listing, sorted by market cap descending
//! - `/simple/price`: per-coin price lookup with optional 24h change/volume
//!
//! The free tier allows roughly 30 calls per minute, so every outbound call
//! goes through a shared [`RateGate`] that enforces a conservative minimum
//! gap between dispatches. On a 429 the client waits a fixed cooldown and
//! retries exactly once; a second 429 is fatal.

use crate::error::{AppError, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Base URL for the CoinGecko API
const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Minimum gap between outbound calls (~24 calls/min, safe for the 30/min free tier)
const MIN_CALL_INTERVAL: Duration = Duration::from_millis(2500);

/// Cooldown after a 429 before the single retry
const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(120);

/// Coin ids per `/simple/price` lookup, capped to keep free-tier usage low
const PRICE_CHANGE_ID_LIMIT: usize = 10;

/// Provider-side cap on `per_page` we are willing to request
const MAX_PER_PAGE: usize = 50;

/// Shared "last dispatch time" gate enforcing a minimum gap between calls.
///
/// This is a leaky-bucket-of-one: a single counter, not a token queue. One
/// gate may back several concurrent pipelines; the mutex is held across the
/// sleep so the read-sleep-update sequence is atomic and two callers cannot
/// both observe an expired interval.
#[derive(Clone, Debug)]
pub struct RateGate {
    last_dispatch: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new(MIN_CALL_INTERVAL)
    }
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_dispatch: Arc::new(Mutex::new(None)),
            min_interval,
        }
    }

    /// Block until the minimum gap since the last dispatch has elapsed,
    /// then claim the current instant as the new last dispatch.
    pub async fn wait(&self) {
        let mut last = self.last_dispatch.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "rate gate: waiting before next call");
                sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// CoinGecko API client with rate gating and single-retry cooldown
#[derive(Debug)]
pub struct CoinGeckoClient {
    client: reqwest::Client,
    base_url: String,
    gate: RateGate,
    cooldown: Duration,
}

impl CoinGeckoClient {
    pub fn new(base_url: impl Into<String>, gate: RateGate) -> Result<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "Invalid base_url: must start with http:// or https://, got: '{}'",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            gate,
            cooldown: RATE_LIMIT_COOLDOWN,
        })
    }

    /// Create a client from `COINGECKO_API_URL`, falling back to the public API
    pub fn from_env(gate: RateGate) -> Result<Self> {
        let base_url = std::env::var("COINGECKO_API_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, gate)
    }

    /// Override the 429 cooldown (tests use a short one)
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Fetch the top market listings for the requested quote currency.
    ///
    /// Returns the provider records untyped; validation happens downstream
    /// so that one malformed record cannot sink the whole batch.
    pub async fn fetch_markets(&self, count: usize, vs_currency: &str) -> Result<Vec<Value>> {
        let per_page = count.min(MAX_PER_PAGE);
        let url = format!(
            "{}/coins/markets?vs_currency={}&order=market_cap_desc&per_page={}&page=1&sparkline=false",
            self.base_url, vs_currency, per_page
        );

        info!(per_page, vs_currency, "fetching market listings");
        let json = self.get_json(&url).await?;

        match json {
            Value::Array(records) => {
                info!(count = records.len(), "fetched market listings");
                Ok(records)
            }
            _ => Err(AppError::Parse(
                "expected a JSON array of market listings".to_string(),
            )),
        }
    }

    /// Best-effort enrichment: copy 24h change and volume from
    /// `/simple/price` into matching records.
    ///
    /// An error here means the records are served without change data; the
    /// caller decides whether to surface that as a degraded-data notice.
    pub async fn merge_price_changes(&self, records: &mut [Value]) -> Result<()> {
        let ids: Vec<&str> = records
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_str))
            .take(PRICE_CHANGE_ID_LIMIT)
            .collect();

        if ids.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd&include_24hr_change=true&include_24hr_vol=true",
            self.base_url,
            ids.join(",")
        );

        debug!(coins = ids.len(), "fetching price changes");
        let prices = self.get_json(&url).await?;

        for record in records.iter_mut() {
            let id = match record.get("id").and_then(Value::as_str) {
                Some(id) => id.to_string(),
                None => continue,
            };
            let price_data = match prices.get(id.as_str()) {
                Some(data) => data,
                None => continue,
            };
            let change = price_data.get("usd_24h_change").cloned();
            let volume = price_data.get("usd_24h_vol").cloned();

            if let Some(fields) = record.as_object_mut() {
                if let Some(change) = change.filter(|v| !v.is_null()) {
                    fields.insert("price_change_percentage_24h".to_string(), change);
                }
                if let Some(volume) = volume.filter(|v| !v.is_null()) {
                    fields.insert("total_volume".to_string(), volume);
                }
            }
        }

        Ok(())
    }

    /// GET a URL through the rate gate with the single-retry 429 policy.
    ///
    /// Any non-2xx status other than 429 fails immediately with no retry.
    async fn get_json(&self, url: &str) -> Result<Value> {
        self.gate.wait().await;
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(
                cooldown_secs = self.cooldown.as_secs(),
                "provider rate limit hit, cooling down before one retry"
            );
            sleep(self.cooldown).await;

            self.gate.wait().await;
            response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| AppError::Network(format!("retry request failed: {}", e)))?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(AppError::RateLimit);
            }
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(AppError::Network(format!(
                "API returned error status {}: {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Network(format!("failed to read response body: {}", e)))?;

        serde_json::from_str(&body)
            .map_err(|e| AppError::Parse(format!("failed to parse JSON response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn test_client(server: &MockServer) -> CoinGeckoClient {
        CoinGeckoClient::new(server.url(""), RateGate::new(Duration::ZERO))
            .unwrap()
            .with_cooldown(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn rate_gate_spaces_out_calls() {
        let gate = RateGate::new(Duration::from_millis(50));
        let start = Instant::now();
        gate.wait().await;
        gate.wait().await;
        gate.wait().await;
        assert!(
            start.elapsed() >= Duration::from_millis(100),
            "three gated calls finished too quickly: {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn fetch_markets_returns_raw_records() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/coins/markets")
                    .query_param("vs_currency", "usd")
                    .query_param("per_page", "2");
                then.status(200).json_body(json!([
                    {"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 65000.0},
                    {"id": "ethereum", "symbol": "eth", "name": "Ethereum", "current_price": 3200.0}
                ]));
            })
            .await;

        let client = test_client(&server);
        let records = client.fetch_markets(2, "usd").await.unwrap();

        mock.assert_async().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], "bitcoin");
    }

    #[tokio::test]
    async fn per_page_is_clamped() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/coins/markets")
                    .query_param("per_page", "50");
                then.status(200).json_body(json!([]));
            })
            .await;

        let client = test_client(&server);
        client.fetch_markets(500, "usd").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn second_rate_limit_response_is_fatal() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/coins/markets");
                then.status(429);
            })
            .await;

        let client = test_client(&server);
        let err = client.fetch_markets(5, "usd").await.unwrap_err();

        assert!(matches!(err, AppError::RateLimit));
        // one initial call plus exactly one retry
        mock.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn transport_error_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/coins/markets");
                then.status(500).body("boom");
            })
            .await;

        let client = test_client(&server);
        let err = client.fetch_markets(5, "usd").await.unwrap_err();

        assert!(matches!(err, AppError::Network(_)));
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn merge_price_changes_fills_matching_records() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/simple/price");
                then.status(200).json_body(json!({
                    "bitcoin": {"usd": 65000.0, "usd_24h_change": 2.5, "usd_24h_vol": 1.2e10},
                    "ethereum": {"usd": 3200.0, "usd_24h_change": null}
                }));
            })
            .await;

        let client = test_client(&server);
        let mut records = vec![
            json!({"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 65000.0}),
            json!({"id": "ethereum", "symbol": "eth", "name": "Ethereum", "current_price": 3200.0}),
            json!({"id": "solana", "symbol": "sol", "name": "Solana", "current_price": 150.0}),
        ];

        client.merge_price_changes(&mut records).await.unwrap();

        assert_eq!(records[0]["price_change_percentage_24h"], 2.5);
        assert_eq!(records[0]["total_volume"], 1.2e10);
        // null change is not merged
        assert!(records[1].get("price_change_percentage_24h").is_none());
        // record absent from the lookup stays untouched
        assert!(records[2].get("price_change_percentage_24h").is_none());
    }

    #[tokio::test]
    async fn merge_price_changes_propagates_transport_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/simple/price");
                then.status(500);
            })
            .await;

        let client = test_client(&server);
        let mut records = vec![json!({"id": "bitcoin"})];
        let before = records.clone();

        let err = client.merge_price_changes(&mut records).await.unwrap_err();
        assert!(matches!(err, AppError::Network(_)));
        // records are left untouched for the caller to serve degraded
        assert_eq!(records, before);
    }

    #[test]
    fn rejects_invalid_base_url() {
        let err = CoinGeckoClient::new("not-a-url", RateGate::default()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}

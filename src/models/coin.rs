use serde::{Deserialize, Serialize};

/// A validated market listing for a single cryptocurrency.
///
/// Only the identity fields and the current price are required. The free
/// data tier omits market cap, volume and percentage changes for some coins,
/// so those stay optional and downstream consumers must tolerate their
/// absence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinRecord {
    /// Provider identifier (e.g. "bitcoin")
    pub id: String,

    /// Ticker symbol (e.g. "btc")
    pub symbol: String,

    /// Display name (e.g. "Bitcoin")
    pub name: String,

    /// Current price in the requested quote currency
    pub current_price: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_volume: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change_percentage_24h: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change_percentage_7d: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change_percentage_30d: Option<f64>,

    /// Coin image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// When the provider last refreshed this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_minimal_record() {
        let value = json!({
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "current_price": 65000.0
        });

        let coin: CoinRecord = serde_json::from_value(value).unwrap();
        assert_eq!(coin.id, "bitcoin");
        assert_eq!(coin.market_cap, None);
        assert_eq!(coin.price_change_percentage_24h, None);
    }

    #[test]
    fn rejects_missing_price() {
        let value = json!({
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin"
        });

        assert!(serde_json::from_value::<CoinRecord>(value).is_err());
    }

    #[test]
    fn tolerates_null_optionals_and_unknown_fields() {
        let value = json!({
            "id": "tether",
            "symbol": "usdt",
            "name": "Tether",
            "current_price": 1.0,
            "market_cap": null,
            "circulating_supply": 119_000_000_000u64,
            "price_change_percentage_24h": -0.02
        });

        let coin: CoinRecord = serde_json::from_value(value).unwrap();
        assert_eq!(coin.market_cap, None);
        assert_eq!(coin.price_change_percentage_24h, Some(-0.02));
    }
}

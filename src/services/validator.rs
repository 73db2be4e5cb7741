//! Per-record validation of raw market listings.

use crate::models::CoinRecord;
use serde_json::Value;

/// Validate a batch of raw market listings against the permissive contract.
///
/// Each record is checked independently; a rejected record contributes
/// exactly one human-readable error naming the raw `id` when present, and
/// validation of one record never aborts the batch. Every input ends up in
/// exactly one of the two outputs.
pub fn validate_records(raw: &[Value]) -> (Vec<CoinRecord>, Vec<String>) {
    let mut validated = Vec::with_capacity(raw.len());
    let mut errors = Vec::new();

    for record in raw {
        match serde_json::from_value::<CoinRecord>(record.clone()) {
            Ok(coin) => validated.push(coin),
            Err(e) => {
                let id = record
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                errors.push(format!("validation error for {}: {}", id, e));
            }
        }
    }

    (validated, errors)
}

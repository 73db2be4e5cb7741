//! Spreadsheet report renderer.
//!
//! Pure side-effecting exporter: one tabular sheet of per-record fields
//! followed by a key-value summary panel of the market-overview numbers.
//! No business logic lives here.

use crate::error::{AppError, Result};
use crate::models::{AnalysisResults, CoinRecord};
use crate::utils::artifact_timestamp;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const TABLE_HEADERS: [&str; 6] = [
    "ID",
    "Symbol",
    "Name",
    "Current Price",
    "Market Cap",
    "24h Change (%)",
];

/// Write the report sheet into `reports_dir` and return the written path.
///
/// The filename embeds a timestamp so repeated runs never collide.
pub fn write_report(
    records: &[CoinRecord],
    results: &AnalysisResults,
    reports_dir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(reports_dir)
        .map_err(|e| AppError::Io(format!("failed to create reports directory: {}", e)))?;

    let filename = format!("crypto_analysis_{}.csv", artifact_timestamp());
    let path = reports_dir.join(&filename);

    let mut writer = csv::Writer::from_path(&path)?;

    writer.write_record(pad_row(&["Cryptocurrency Market Analysis Report"]))?;
    let generated = format!("Generated on: {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
    writer.write_record(pad_row(&[&generated]))?;
    writer.write_record(pad_row(&[]))?;

    writer.write_record(TABLE_HEADERS)?;
    for coin in records {
        let price = format!("{}", coin.current_price);
        let cap = coin
            .market_cap
            .map(|v| format!("{:.0}", v))
            .unwrap_or_default();
        let change = coin
            .price_change_percentage_24h
            .map(|v| format!("{:.2}", v))
            .unwrap_or_default();
        writer.write_record([
            coin.id.as_str(),
            coin.symbol.as_str(),
            coin.name.as_str(),
            price.as_str(),
            cap.as_str(),
            change.as_str(),
        ])?;
    }

    writer.write_record(pad_row(&[]))?;
    writer.write_record(pad_row(&["Analysis Summary"]))?;

    let overview = &results.market_overview;
    let summary = [
        (
            "Total Cryptos Analyzed",
            overview.total_cryptos_analyzed.to_string(),
        ),
        ("Total Market Cap", format!("{:.0}", overview.total_market_cap)),
        ("Average Price", format!("{:.2}", overview.average_price)),
        ("Median Price", format!("{:.2}", overview.median_price)),
        ("Min Price", format!("{:.2}", overview.price_range.min)),
        ("Max Price", format!("{:.2}", overview.price_range.max)),
    ];
    for (key, value) in summary {
        writer.write_record(pad_row(&[key, value.as_str()]))?;
    }

    writer.flush()?;
    info!(path = %path.display(), "report written");
    Ok(path)
}

/// Pad a partial row to the table width so every row has six cells
fn pad_row<'a>(cells: &[&'a str]) -> Vec<&'a str> {
    let mut row = cells.to_vec();
    row.resize(TABLE_HEADERS.len(), "");
    row
}

//! Chart renderers.
//!
//! Pure side-effecting exporters producing PNG files: a market-cap bar
//! chart, a green/red 24h-change bar chart when change data exists, and a
//! market-share pie when there are more than five records. Failure here is
//! local to the charts stage.

use crate::error::{AppError, Result};
use crate::models::CoinRecord;
use crate::utils::artifact_timestamp;
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const BAR_CHART_SIZE: (u32, u32) = (1200, 600);
const PIE_CHART_SIZE: (u32, u32) = (800, 800);

/// Bars on the market-cap chart
const BAR_TOP_N: usize = 10;

/// Slices on the pie before everything else folds into "Others"
const PIE_TOP_N: usize = 5;

const BAR_FILL: RGBColor = RGBColor(135, 206, 235);
const GAIN_FILL: RGBColor = RGBColor(46, 139, 87);
const LOSS_FILL: RGBColor = RGBColor(178, 34, 34);

const PIE_COLORS: [RGBColor; 6] = [
    RGBColor(66, 133, 244),
    RGBColor(219, 68, 55),
    RGBColor(244, 180, 0),
    RGBColor(15, 157, 88),
    RGBColor(171, 71, 188),
    RGBColor(158, 158, 158),
];

/// Render the chart set into `charts_dir` and return the written paths.
pub fn render_charts(
    records: &[CoinRecord],
    has_price_changes: bool,
    charts_dir: &Path,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(charts_dir)
        .map_err(|e| AppError::Io(format!("failed to create charts directory: {}", e)))?;

    let timestamp = artifact_timestamp();
    let mut paths = Vec::new();

    let path = charts_dir.join(format!("market_cap_distribution_{}.png", timestamp));
    market_cap_chart(records, &path)?;
    paths.push(path);

    if has_price_changes {
        let path = charts_dir.join(format!("price_changes_{}.png", timestamp));
        if price_change_chart(records, &path)? {
            paths.push(path);
        }
    }

    if records.len() > PIE_TOP_N {
        let path = charts_dir.join(format!("market_distribution_{}.png", timestamp));
        market_share_chart(records, &path)?;
        paths.push(path);
    }

    info!(count = paths.len(), "charts rendered");
    Ok(paths)
}

/// Records sorted by market cap descending, stable on ties
fn by_market_cap(records: &[CoinRecord]) -> Vec<&CoinRecord> {
    let mut sorted: Vec<&CoinRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        b.market_cap
            .unwrap_or(0.0)
            .total_cmp(&a.market_cap.unwrap_or(0.0))
    });
    sorted
}

fn market_cap_chart(records: &[CoinRecord], path: &Path) -> Result<()> {
    let mut top = by_market_cap(records);
    top.truncate(BAR_TOP_N);
    let max_cap = top
        .first()
        .and_then(|c| c.market_cap)
        .unwrap_or(0.0)
        .max(1.0);

    let root = BitMapBackend::new(path, BAR_CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Top 10 Cryptocurrencies by Market Cap", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d(0i32..top.len() as i32, 0.0..max_cap * 1.05)
        .map_err(draw_error)?;

    let names: Vec<String> = top.iter().map(|c| c.name.clone()).collect();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(top.len())
        .x_label_formatter(&|i| {
            names
                .get(*i as usize)
                .cloned()
                .unwrap_or_default()
        })
        .y_desc("Market Cap (USD)")
        .draw()
        .map_err(draw_error)?;

    chart
        .draw_series(top.iter().enumerate().map(|(i, coin)| {
            let cap = coin.market_cap.unwrap_or(0.0);
            Rectangle::new([(i as i32, 0.0), (i as i32 + 1, cap)], BAR_FILL.filled())
        }))
        .map_err(draw_error)?;

    root.present()
        .map_err(|e| AppError::Io(format!("failed to write chart: {}", e)))?;
    Ok(())
}

/// Returns false when no record carries a change value (nothing drawn)
fn price_change_chart(records: &[CoinRecord], path: &Path) -> Result<bool> {
    let changes: Vec<(&str, f64)> = records
        .iter()
        .filter_map(|c| {
            c.price_change_percentage_24h
                .map(|change| (c.symbol.as_str(), change))
        })
        .collect();

    if changes.is_empty() {
        return Ok(false);
    }

    let low = changes
        .iter()
        .map(|(_, c)| *c)
        .fold(f64::INFINITY, f64::min)
        .min(0.0);
    let high = changes
        .iter()
        .map(|(_, c)| *c)
        .fold(f64::NEG_INFINITY, f64::max)
        .max(0.0);
    let pad = ((high - low) * 0.1).max(0.5);

    let root = BitMapBackend::new(path, BAR_CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("24h Price Changes", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0i32..changes.len() as i32, (low - pad)..(high + pad))
        .map_err(draw_error)?;

    let symbols: Vec<String> = changes.iter().map(|(s, _)| s.to_uppercase()).collect();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(changes.len())
        .x_label_formatter(&|i| symbols.get(*i as usize).cloned().unwrap_or_default())
        .y_desc("Price Change (%)")
        .draw()
        .map_err(draw_error)?;

    chart
        .draw_series(changes.iter().enumerate().map(|(i, (_, change))| {
            let fill = if *change > 0.0 { GAIN_FILL } else { LOSS_FILL };
            Rectangle::new([(i as i32, 0.0), (i as i32 + 1, *change)], fill.filled())
        }))
        .map_err(draw_error)?;

    root.present()
        .map_err(|e| AppError::Io(format!("failed to write chart: {}", e)))?;
    Ok(true)
}

/// Top-five market caps plus an aggregated "Others" slice.
///
/// Pure helper so the slice math is testable without drawing anything.
fn pie_slices(records: &[CoinRecord]) -> (Vec<f64>, Vec<String>) {
    let sorted = by_market_cap(records);
    let mut sizes: Vec<f64> = sorted
        .iter()
        .take(PIE_TOP_N)
        .map(|c| c.market_cap.unwrap_or(0.0))
        .collect();
    let mut labels: Vec<String> = sorted
        .iter()
        .take(PIE_TOP_N)
        .map(|c| c.name.clone())
        .collect();

    let others: f64 = sorted
        .iter()
        .skip(PIE_TOP_N)
        .map(|c| c.market_cap.unwrap_or(0.0))
        .sum();
    if others > 0.0 {
        sizes.push(others);
        labels.push("Others".to_string());
    }

    (sizes, labels)
}

fn market_share_chart(records: &[CoinRecord], path: &Path) -> Result<()> {
    let (sizes, labels) = pie_slices(records);

    let root = BitMapBackend::new(path, PIE_CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_error)?;

    let center = (
        PIE_CHART_SIZE.0 as i32 / 2,
        PIE_CHART_SIZE.1 as i32 / 2,
    );
    let radius = PIE_CHART_SIZE.0 as f64 / 3.0;
    let colors: Vec<RGBColor> = (0..sizes.len())
        .map(|i| PIE_COLORS[i % PIE_COLORS.len()])
        .collect();

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.label_style(("sans-serif", 18).into_font());
    pie.percentages(("sans-serif", 14).into_font());

    root.draw(&pie)
        .map_err(|e| AppError::Other(format!("chart rendering failed: {}", e)))?;
    root.present()
        .map_err(|e| AppError::Io(format!("failed to write chart: {}", e)))?;
    Ok(())
}

fn draw_error<E: std::fmt::Display>(e: E) -> AppError {
    AppError::Other(format!("chart rendering failed: {}", e))
}

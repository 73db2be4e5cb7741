//! Statistics engine.
//!
//! Pure functions of the validated record set, no I/O. Four independent
//! sub-computations, each tolerant of missing inputs and of an empty slice;
//! the orchestrator is responsible for not running analysis on an empty
//! validated set in the first place.

use crate::models::{
    AnalysisResults, CapEntry, ChangeEntry, CoinRecord, MarketOverview, PriceRange, PriceTrends,
    Section, TopPerformers, VolumeAnalysis,
};

const NOTE_NO_PRICE_CHANGES: &str = "Price change data not available";
const NOTE_NO_VOLUME: &str = "Volume data not available";

/// How many leaders each top-performers ranking keeps
const TOP_N: usize = 5;

/// Compute the full derived-results mapping.
///
/// `has_price_changes` comes from the collection stage; when false the
/// price-trends category is the explicit placeholder note.
pub fn analyze(records: &[CoinRecord], has_price_changes: bool) -> AnalysisResults {
    AnalysisResults {
        market_overview: market_overview(records),
        price_trends: if has_price_changes {
            price_trends(records)
        } else {
            Section::unavailable(NOTE_NO_PRICE_CHANGES)
        },
        volume_analysis: volume_analysis(records),
        top_performers: top_performers(records),
    }
}

fn market_overview(records: &[CoinRecord]) -> MarketOverview {
    // zero-priced records carry no usable price signal
    let mut prices: Vec<f64> = records
        .iter()
        .map(|c| c.current_price)
        .filter(|p| *p != 0.0)
        .collect();

    let total_market_cap: f64 = records.iter().map(|c| c.market_cap.unwrap_or(0.0)).sum();

    let (average_price, median_price, min, max) = if prices.is_empty() {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        let average = prices.iter().sum::<f64>() / prices.len() as f64;
        prices.sort_by(f64::total_cmp);
        let n = prices.len();
        let median = if n % 2 == 1 {
            prices[n / 2]
        } else {
            (prices[n / 2 - 1] + prices[n / 2]) / 2.0
        };
        (average, median, prices[0], prices[n - 1])
    };

    MarketOverview {
        total_cryptos_analyzed: records.len(),
        total_market_cap,
        average_price,
        median_price,
        price_range: PriceRange { min, max },
    }
}

fn price_trends(records: &[CoinRecord]) -> Section<PriceTrends> {
    let changes: Vec<f64> = records
        .iter()
        .filter_map(|c| c.price_change_percentage_24h)
        .collect();

    if changes.is_empty() {
        return Section::unavailable(NOTE_NO_PRICE_CHANGES);
    }

    let average = changes.iter().sum::<f64>() / changes.len() as f64;
    let positive = changes.iter().filter(|c| **c > 0.0).count();
    let negative = changes.iter().filter(|c| **c < 0.0).count();
    let strongest_gain = changes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let biggest_loss = changes.iter().copied().fold(f64::INFINITY, f64::min);

    Section::Computed(PriceTrends {
        average_24h_change: average,
        positive_movers: positive,
        negative_movers: negative,
        strongest_gain,
        biggest_loss,
    })
}

fn volume_analysis(records: &[CoinRecord]) -> Section<VolumeAnalysis> {
    let volumes: Vec<f64> = records.iter().filter_map(|c| c.total_volume).collect();

    if volumes.is_empty() {
        return Section::unavailable(NOTE_NO_VOLUME);
    }

    let total: f64 = volumes.iter().sum();
    let average = total / volumes.len() as f64;

    // strictly-greater comparison: first occurrence wins ties
    let mut best: Option<(&CoinRecord, f64)> = None;
    for coin in records {
        let volume = match coin.total_volume {
            Some(v) => v,
            None => continue,
        };
        if best.map_or(true, |(_, top)| volume > top) {
            best = Some((coin, volume));
        }
    }

    Section::Computed(VolumeAnalysis {
        total_volume: total,
        average_volume: average,
        highest_volume_crypto: best.map(|(c, _)| c.name.clone()).unwrap_or_default(),
    })
}

fn top_performers(records: &[CoinRecord]) -> TopPerformers {
    let mut by_cap: Vec<&CoinRecord> = records.iter().collect();
    // stable sort keeps input order for equal caps
    by_cap.sort_by(|a, b| {
        b.market_cap
            .unwrap_or(0.0)
            .total_cmp(&a.market_cap.unwrap_or(0.0))
    });
    let by_market_cap = by_cap
        .iter()
        .take(TOP_N)
        .map(|c| CapEntry {
            name: c.name.clone(),
            market_cap: c.market_cap.unwrap_or(0.0),
        })
        .collect();

    let mut with_change: Vec<&CoinRecord> = records
        .iter()
        .filter(|c| c.price_change_percentage_24h.is_some())
        .collect();
    let by_24h_change = if with_change.is_empty() {
        Vec::new()
    } else {
        with_change.sort_by(|a, b| {
            b.price_change_percentage_24h
                .unwrap_or(0.0)
                .total_cmp(&a.price_change_percentage_24h.unwrap_or(0.0))
        });
        with_change
            .iter()
            .take(TOP_N)
            .map(|c| ChangeEntry {
                name: c.name.clone(),
                change: c.price_change_percentage_24h.unwrap_or(0.0),
            })
            .collect()
    };

    TopPerformers {
        by_market_cap,
        by_24h_change,
    }
}

use serde::Serialize;

/// One analysis category that may be unavailable for the current data set.
///
/// Serialized untagged: either the computed mapping or `{"note": "..."}`.
/// Every category key is always present in the results, so consumers can
/// probe a known key; absence of data is expressed by the note, never by
/// omission.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Section<T> {
    Computed(T),
    Unavailable { note: String },
}

impl<T> Section<T> {
    pub fn unavailable(note: impl Into<String>) -> Self {
        Section::Unavailable { note: note.into() }
    }

    pub fn as_computed(&self) -> Option<&T> {
        match self {
            Section::Computed(value) => Some(value),
            Section::Unavailable { .. } => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Section::Unavailable { .. })
    }
}

/// Basic market statistics over the validated record set
#[derive(Debug, Clone, Serialize)]
pub struct MarketOverview {
    pub total_cryptos_analyzed: usize,
    /// Sum of market caps; records without one count as zero
    pub total_market_cap: f64,
    pub average_price: f64,
    pub median_price: f64,
    pub price_range: PriceRange,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

/// 24h price-change statistics, present only when change data exists
#[derive(Debug, Clone, Serialize)]
pub struct PriceTrends {
    pub average_24h_change: f64,
    pub positive_movers: usize,
    pub negative_movers: usize,
    pub strongest_gain: f64,
    pub biggest_loss: f64,
}

/// Trading-volume statistics over records carrying a volume value
#[derive(Debug, Clone, Serialize)]
pub struct VolumeAnalysis {
    pub total_volume: f64,
    pub average_volume: f64,
    /// Display name of the single highest-volume record
    pub highest_volume_crypto: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapEntry {
    pub name: String,
    pub market_cap: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeEntry {
    pub name: String,
    pub change: f64,
}

/// Ranked leaders: always by market cap, by 24h change when available
#[derive(Debug, Clone, Serialize)]
pub struct TopPerformers {
    pub by_market_cap: Vec<CapEntry>,
    /// Empty when no record carries a 24h change value
    pub by_24h_change: Vec<ChangeEntry>,
}

/// The full derived-results mapping produced by the statistics engine.
///
/// The four categories are fixed; `price_trends` and `volume_analysis` fall
/// back to a [`Section::Unavailable`] note when their inputs are missing.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResults {
    pub market_overview: MarketOverview,
    pub price_trends: Section<PriceTrends>,
    pub volume_analysis: Section<VolumeAnalysis>,
    pub top_performers: TopPerformers,
}

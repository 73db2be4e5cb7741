mod analysis;
mod coin;

pub use analysis::{
    AnalysisResults, CapEntry, ChangeEntry, MarketOverview, PriceRange, PriceTrends, Section,
    TopPerformers, VolumeAnalysis,
};
pub use coin::CoinRecord;

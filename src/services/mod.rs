pub mod analyzer;
pub mod charts;
pub mod coingecko;
pub mod insights;
pub mod report;
pub mod validator;

pub use coingecko::{CoinGeckoClient, RateGate};
pub use insights::InsightsClient;

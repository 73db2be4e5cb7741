//! Narrative insight generation.
//!
//! Turns the derived-results mapping into a short list of human-readable
//! insight strings via a chat-completions call. The remote model's output is
//! parsed lossily: only numbered or bulleted lines survive, capped at four.
//! When the remote call fails for any reason the caller falls back to
//! [`fallback_insights`], which is deterministic and needs no network.

use crate::error::{AppError, Result};
use crate::models::{AnalysisResults, CoinRecord};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const MODEL: &str = "gpt-3.5-turbo";
const MAX_INSIGHTS: usize = 4;

const SYSTEM_PROMPT: &str = "You are a professional cryptocurrency market analyst. \
Provide clear, actionable insights based on the data provided.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Client for the text-generation provider
pub struct InsightsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl InsightsClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Create a client from `OPENAI_API_URL` / `OPENAI_API_KEY`.
    ///
    /// A missing key is not an error here; `summarize` reports it per call
    /// so the pipeline can fall back.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("OPENAI_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = std::env::var("OPENAI_API_KEY").ok();
        Self::new(base_url, api_key)
    }

    /// Ask the model for up to four insight strings grounded in the market
    /// summary. Any failure (missing key, transport, bad response shape)
    /// propagates so the caller can use the deterministic fallback.
    pub async fn summarize(
        &self,
        results: &AnalysisResults,
        records: &[CoinRecord],
    ) -> Result<Vec<String>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("OPENAI_API_KEY not set".to_string()))?;

        let summary = market_summary(results, records);
        let prompt = insights_prompt(&summary);
        debug!(summary_len = summary.len(), "requesting AI insights");

        let request = ChatRequest {
            model: MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: 500,
            temperature: 0.7,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("insights request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Network(format!(
                "insights API returned error status {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("failed to parse insights response: {}", e)))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        let insights = structure_insights(content);
        info!(count = insights.len(), "generated AI insights");
        Ok(insights)
    }
}

/// Plain-language grounding context for the generation prompt
fn market_summary(results: &AnalysisResults, records: &[CoinRecord]) -> String {
    let overview = &results.market_overview;
    let mut summary = format!(
        "Market Analysis Summary:\n\
         - Total cryptocurrencies analyzed: {}\n\
         - Total market cap: ${:.2}\n\
         - Average price: ${:.2}\n",
        overview.total_cryptos_analyzed, overview.total_market_cap, overview.average_price
    );

    if let Some(trends) = results.price_trends.as_computed() {
        summary.push_str(&format!(
            "- Average 24h change: {:.2}%\n\
             - Positive movers: {}\n\
             - Negative movers: {}\n",
            trends.average_24h_change, trends.positive_movers, trends.negative_movers
        ));
    }

    let top = &results.top_performers.by_market_cap;
    if !top.is_empty() {
        summary.push_str("Top performers by market cap:\n");
        for entry in top.iter().take(3) {
            // attach the ticker symbol when the record is still around
            match records.iter().find(|c| c.name == entry.name) {
                Some(coin) => summary.push_str(&format!(
                    "- {} ({}): ${:.0}\n",
                    entry.name,
                    coin.symbol.to_uppercase(),
                    entry.market_cap
                )),
                None => summary.push_str(&format!("- {}: ${:.0}\n", entry.name, entry.market_cap)),
            }
        }
    }

    summary
}

fn insights_prompt(market_summary: &str) -> String {
    format!(
        "Based on this cryptocurrency market data:\n\n{}\n\n\
         Please provide 3-4 key insights about:\n\
         1. Overall market sentiment\n\
         2. Notable trends or patterns\n\
         3. Investment considerations\n\
         4. Market risks or opportunities\n\n\
         Keep insights professional, concise, and actionable for investors.",
        market_summary
    )
}

/// Scan model output for numbered or bulleted lines, stripping the prefix.
///
/// Lossy by design: lines without a recognized prefix are dropped and only
/// the first four survivors are kept, in the order they appeared. Callers
/// must not assume all model output survives.
pub fn structure_insights(text: &str) -> Vec<String> {
    let mut insights = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        let first = match line.chars().next() {
            Some(c) => c,
            None => continue,
        };
        if !(first.is_ascii_digit() || first == '•' || first == '-') {
            continue;
        }

        let clean = line
            .trim_start_matches(|c: char| c.is_ascii_digit() || ".•- ".contains(c))
            .trim();
        if !clean.is_empty() {
            insights.push(clean.to_string());
        }
        if insights.len() == MAX_INSIGHTS {
            break;
        }
    }

    insights
}

/// Deterministic fallback used when the remote call fails.
///
/// Two statements from the market-overview numbers, plus one sentiment
/// statement only when price-trend data exists.
pub fn fallback_insights(results: &AnalysisResults) -> Vec<String> {
    let overview = &results.market_overview;
    let mut insights = vec![
        format!(
            "Market analysis covers {} cryptocurrencies with total market cap of ${:.0}",
            overview.total_cryptos_analyzed, overview.total_market_cap
        ),
        format!(
            "Average cryptocurrency price in this dataset is ${:.2}",
            overview.average_price
        ),
    ];

    if let Some(trends) = results.price_trends.as_computed() {
        let avg = trends.average_24h_change;
        if avg > 0.0 {
            insights.push(format!(
                "Market shows positive momentum with average 24h change of +{:.2}%",
                avg
            ));
        } else {
            insights.push(format!(
                "Market shows bearish sentiment with average 24h change of {:.2}%",
                avg
            ));
        }
    }

    insights
}

use crate::pipeline::{Pipeline, StageStatus, WorkflowStatus};
use crate::services::{CoinGeckoClient, InsightsClient, RateGate};
use crate::utils::get_reports_dir;
use std::sync::Arc;

pub async fn run(num_coins: usize, vs_currency: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    println!("🔍 Analyzing top {} cryptocurrencies ({})", num_coins, vs_currency);

    let gateway = match CoinGeckoClient::from_env(RateGate::default()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("❌ Failed to create market data client: {}", e);
            std::process::exit(1);
        }
    };
    let insights = match InsightsClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("❌ Failed to create insights client: {}", e);
            std::process::exit(1);
        }
    };

    let reports_dir = get_reports_dir();
    let pipeline = Pipeline::new(gateway, insights, reports_dir);
    let state = pipeline.run(num_coins, vs_currency).await;

    match state.workflow_status {
        WorkflowStatus::Completed => println!("✅ Analysis completed"),
        _ => println!("⚠️  Analysis completed with errors"),
    }

    if let Some(results) = &state.analysis_results {
        let overview = &results.market_overview;
        println!("   📊 Cryptos analyzed: {}", overview.total_cryptos_analyzed);
        println!("   💰 Total market cap: ${:.0}", overview.total_market_cap);
        println!("   💵 Average price:    ${:.2}", overview.average_price);
    }

    if !state.insights.is_empty() {
        println!("💡 Insights:");
        for insight in &state.insights {
            println!("   - {}", insight);
        }
    }

    if let Some(path) = &state.report_path {
        println!("📄 Report: {}", path.display());
    }
    if state.charts_status == StageStatus::Completed {
        println!("📈 Charts:");
        for path in &state.chart_paths {
            println!("   - {}", path.display());
        }
    }

    for warning in &state.warnings {
        eprintln!("⚠️  Warning: {}", warning);
    }
    for error in &state.errors {
        eprintln!("❌ Error: {}", error);
    }
}

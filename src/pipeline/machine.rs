//! Pipeline orchestrator.
//!
//! A small explicit state machine drives one analysis run. Routing is a pure
//! function of the current node and the last stage outcome, so the whole
//! control graph is visible (and testable) in one place:
//!
//! ```text
//! start -> data_collection -> analysis -> enrichment -> done
//!                |               |
//!                +---failure-----+-----> error_handler -> done
//! ```
//!
//! Critical stages route to the error handler on failure. Enrichment stages
//! (insights, report, charts) run inside one node and fail soft: they mark
//! their own status and the run still terminates as completed.

use crate::models::AnalysisResults;
use crate::pipeline::state::{AnalysisState, Criticality, Stage, WorkflowStatus};
use crate::services::coingecko::CoinGeckoClient;
use crate::services::insights::{fallback_insights, InsightsClient};
use crate::services::{analyzer, charts, report, validator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Node of the pipeline graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Start,
    DataCollection,
    Analysis,
    Enrichment,
    ErrorHandler,
    Done,
}

/// Outcome a stage reports to the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// The complete routing table. Pure, total over both inputs.
pub fn transition(node: Node, outcome: Outcome) -> Node {
    match (node, outcome) {
        (Node::Start, _) => Node::DataCollection,
        (Node::DataCollection, Outcome::Success) => Node::Analysis,
        (Node::DataCollection, Outcome::Failure) => Node::ErrorHandler,
        (Node::Analysis, Outcome::Success) => Node::Enrichment,
        (Node::Analysis, Outcome::Failure) => Node::ErrorHandler,
        (Node::Enrichment, _) => Node::Done,
        (Node::ErrorHandler, _) => Node::Done,
        (Node::Done, _) => Node::Done,
    }
}

/// Orchestrator owning the service clients a run needs.
///
/// One instance is shared across requests; all per-run data lives in the
/// [`AnalysisState`] created inside `run`.
pub struct Pipeline {
    gateway: Arc<CoinGeckoClient>,
    insights: InsightsClient,
    reports_dir: PathBuf,
    charts_enabled: bool,
}

impl Pipeline {
    pub fn new(
        gateway: Arc<CoinGeckoClient>,
        insights: InsightsClient,
        reports_dir: PathBuf,
    ) -> Self {
        Self {
            gateway,
            insights,
            reports_dir,
            charts_enabled: true,
        }
    }

    /// Disable chart rendering (headless test environments lack fonts)
    pub fn with_charts(mut self, enabled: bool) -> Self {
        self.charts_enabled = enabled;
        self
    }

    /// Execute one full run and return the final state.
    ///
    /// Never returns an error: every failure mode terminates the machine
    /// through the error handler and is recorded inside the state.
    pub async fn run(&self, num_coins: usize, vs_currency: &str) -> AnalysisState {
        let mut state = AnalysisState::new(num_coins, vs_currency);
        info!(num_coins, vs_currency, "starting analysis workflow");

        let mut node = transition(Node::Start, Outcome::Success);
        while node != Node::Done {
            let outcome = match node {
                Node::DataCollection => self.collect(&mut state).await,
                Node::Analysis => self.run_analysis(&mut state),
                Node::Enrichment => self.enrich(&mut state).await,
                Node::ErrorHandler => self.handle_errors(&mut state),
                Node::Start | Node::Done => Outcome::Success,
            };
            node = transition(node, outcome);
        }

        info!(status = ?state.workflow_status, "analysis workflow finished");
        state
    }

    /// Record a stage failure and translate it to a routing outcome per the
    /// stage's criticality.
    fn fail_stage(
        &self,
        state: &mut AnalysisState,
        stage: Stage,
        message: impl Into<String>,
    ) -> Outcome {
        let message = message.into();
        warn!(stage = stage.name(), %message, "stage failed");
        state.push_error(stage, message);
        state.mark_failed(stage);
        state.touch();
        match stage.criticality() {
            Criticality::Critical => Outcome::Failure,
            Criticality::Enrichment => Outcome::Success,
        }
    }

    async fn collect(&self, state: &mut AnalysisState) -> Outcome {
        let stage = Stage::DataCollection;

        let mut raw = match self
            .gateway
            .fetch_markets(state.num_coins, &state.vs_currency)
            .await
        {
            Ok(records) => records,
            Err(e) => return self.fail_stage(state, stage, e.to_string()),
        };

        // change data is an enhancement; its loss degrades, never aborts
        if let Err(e) = self.gateway.merge_price_changes(&mut raw).await {
            warn!(error = %e, "price change lookup failed, continuing without 24h changes");
            state.push_warning(format!(
                "price change data unavailable, serving market data without 24h changes: {}",
                e
            ));
        }

        let (validated, rejections) = validator::validate_records(&raw);
        for rejection in rejections {
            state.push_warning(rejection);
        }

        if validated.is_empty() {
            state.raw_data = raw;
            return self.fail_stage(state, stage, "no valid crypto data after validation");
        }

        state.has_price_changes = validated
            .iter()
            .any(|c| c.price_change_percentage_24h.is_some());
        info!(
            fetched = raw.len(),
            validated = validated.len(),
            has_price_changes = state.has_price_changes,
            "data collection complete"
        );

        state.raw_data = raw;
        state.validated_data = validated;
        state.mark_completed(stage);
        state.touch();
        Outcome::Success
    }

    fn run_analysis(&self, state: &mut AnalysisState) -> Outcome {
        let stage = Stage::Analysis;

        if state.validated_data.is_empty() {
            return self.fail_stage(
                state,
                stage,
                "no validated crypto data available for analysis",
            );
        }

        let results = analyzer::analyze(&state.validated_data, state.has_price_changes);
        state.analysis_results = Some(results);
        state.mark_completed(stage);
        // the core product exists from here on; enrichment cannot undo this
        state.workflow_status = WorkflowStatus::Completed;
        state.touch();
        Outcome::Success
    }

    async fn enrich(&self, state: &mut AnalysisState) -> Outcome {
        // run_analysis succeeded to get here, so results are present
        let results = match state.analysis_results.clone() {
            Some(results) => results,
            None => return Outcome::Success,
        };

        self.run_insights(state, &results).await;
        self.run_report(state, &results);
        if self.charts_enabled {
            self.run_charts(state);
        }
        Outcome::Success
    }

    async fn run_insights(&self, state: &mut AnalysisState, results: &AnalysisResults) {
        let stage = Stage::Insights;
        match self.insights.summarize(results, &state.validated_data).await {
            Ok(insights) => {
                state.insights = insights;
                state.mark_completed(stage);
                state.touch();
            }
            Err(e) => {
                // run stays useful without the model: deterministic fallback
                state.insights = fallback_insights(results);
                self.fail_stage(state, stage, e.to_string());
            }
        }
    }

    fn run_report(&self, state: &mut AnalysisState, results: &AnalysisResults) {
        let stage = Stage::Report;
        match report::write_report(&state.validated_data, results, &self.reports_dir) {
            Ok(path) => {
                state.report_path = Some(path);
                state.mark_completed(stage);
                state.touch();
            }
            Err(e) => {
                self.fail_stage(state, stage, e.to_string());
            }
        }
    }

    fn run_charts(&self, state: &mut AnalysisState) {
        let stage = Stage::Charts;
        let charts_dir = self.reports_dir.join("charts");
        match charts::render_charts(&state.validated_data, state.has_price_changes, &charts_dir) {
            Ok(paths) => {
                state.chart_paths = paths;
                state.mark_completed(stage);
                state.touch();
            }
            Err(e) => {
                self.fail_stage(state, stage, e.to_string());
            }
        }
    }

    fn handle_errors(&self, state: &mut AnalysisState) -> Outcome {
        warn!(errors = state.errors.len(), "routing run through error handler");
        state.workflow_status = WorkflowStatus::CompletedWithErrors;
        state.push_warning("workflow terminated early, see errors for details");
        state.touch();
        Outcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::StageStatus;
    use crate::services::coingecko::RateGate;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn routing_covers_the_whole_graph() {
        use Node::*;
        use Outcome::*;
        assert_eq!(transition(Start, Success), DataCollection);
        assert_eq!(transition(DataCollection, Success), Analysis);
        assert_eq!(transition(DataCollection, Failure), ErrorHandler);
        assert_eq!(transition(Analysis, Success), Enrichment);
        assert_eq!(transition(Analysis, Failure), ErrorHandler);
        assert_eq!(transition(Enrichment, Success), Done);
        assert_eq!(transition(Enrichment, Failure), Done);
        assert_eq!(transition(ErrorHandler, Success), Done);
        assert_eq!(transition(Done, Success), Done);
    }

    fn market_gateway(server: &MockServer) -> Arc<CoinGeckoClient> {
        Arc::new(
            CoinGeckoClient::new(server.url(""), RateGate::new(Duration::ZERO))
                .unwrap()
                .with_cooldown(Duration::from_millis(10)),
        )
    }

    fn insights_client(server: &MockServer) -> InsightsClient {
        InsightsClient::new(server.url(""), Some("test-key".to_string())).unwrap()
    }

    async fn mock_markets(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/coins/markets");
                then.status(200).json_body(json!([
                    {"id": "bitcoin", "symbol": "btc", "name": "Bitcoin",
                     "current_price": 65000.0, "market_cap": 1.0e12},
                    {"id": "ethereum", "symbol": "eth", "name": "Ethereum",
                     "current_price": 3200.0, "market_cap": 4.0e11}
                ]));
            })
            .await;
    }

    async fn mock_price_changes(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/simple/price");
                then.status(200).json_body(json!({
                    "bitcoin": {"usd": 65000.0, "usd_24h_change": 2.5, "usd_24h_vol": 1.2e10},
                    "ethereum": {"usd": 3200.0, "usd_24h_change": -1.1, "usd_24h_vol": 8.0e9}
                }));
            })
            .await;
    }

    async fn mock_insights(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({
                    "choices": [{"message": {"content": "1. Market looks strong.\n2. Caps are top-heavy."}}]
                }));
            })
            .await;
    }

    #[tokio::test]
    async fn full_run_completes_every_stage() {
        let market = MockServer::start_async().await;
        let ai = MockServer::start_async().await;
        mock_markets(&market).await;
        mock_price_changes(&market).await;
        mock_insights(&ai).await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            market_gateway(&market),
            insights_client(&ai),
            dir.path().to_path_buf(),
        )
        .with_charts(false);

        let state = pipeline.run(2, "usd").await;

        assert_eq!(state.workflow_status, WorkflowStatus::Completed);
        assert_eq!(state.collection_status, StageStatus::Completed);
        assert_eq!(state.analysis_status, StageStatus::Completed);
        assert_eq!(state.insights_status, StageStatus::Completed);
        assert_eq!(state.report_status, StageStatus::Completed);
        assert_eq!(state.charts_status, StageStatus::Pending);
        assert!(state.errors.is_empty());

        assert_eq!(state.validated_data.len(), 2);
        assert!(state.has_price_changes);
        assert_eq!(
            state.insights,
            vec!["Market looks strong.", "Caps are top-heavy."]
        );
        assert!(state.report_path.as_ref().unwrap().exists());
        assert!(state.chart_paths.is_empty());

        let results = state.analysis_results.unwrap();
        assert_eq!(results.market_overview.total_cryptos_analyzed, 2);
        assert!(results.price_trends.as_computed().is_some());
    }

    #[tokio::test]
    async fn provider_outage_routes_through_error_handler() {
        let market = MockServer::start_async().await;
        let ai = MockServer::start_async().await;
        market
            .mock_async(|when, then| {
                when.method(GET).path("/coins/markets");
                then.status(500).body("upstream down");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            market_gateway(&market),
            insights_client(&ai),
            dir.path().to_path_buf(),
        )
        .with_charts(false);

        let state = pipeline.run(10, "usd").await;

        assert_eq!(state.workflow_status, WorkflowStatus::CompletedWithErrors);
        assert_eq!(state.collection_status, StageStatus::Failed);
        // downstream stages never ran
        assert_eq!(state.analysis_status, StageStatus::Pending);
        assert_eq!(state.insights_status, StageStatus::Pending);
        assert!(state.analysis_results.is_none());
        assert_eq!(state.errors.len(), 1);
        assert!(state.errors[0].starts_with("data_collection:"));
        assert!(state.errors[0].contains("500"));
    }

    #[tokio::test]
    async fn all_records_invalid_fails_collection() {
        let market = MockServer::start_async().await;
        let ai = MockServer::start_async().await;
        market
            .mock_async(|when, then| {
                when.method(GET).path("/coins/markets");
                then.status(200).json_body(json!([
                    {"id": "broken-a"},
                    {"id": "broken-b"}
                ]));
            })
            .await;
        mock_price_changes(&market).await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            market_gateway(&market),
            insights_client(&ai),
            dir.path().to_path_buf(),
        )
        .with_charts(false);

        let state = pipeline.run(2, "usd").await;

        assert_eq!(state.workflow_status, WorkflowStatus::CompletedWithErrors);
        assert_eq!(state.collection_status, StageStatus::Failed);
        assert!(state
            .errors
            .iter()
            .any(|e| e.contains("no valid crypto data after validation")));
        // each rejection is still individually reported
        assert_eq!(
            state.warnings.iter().filter(|w| w.contains("broken-")).count(),
            2
        );
    }

    #[tokio::test]
    async fn price_change_outage_degrades_without_failing() {
        let market = MockServer::start_async().await;
        let ai = MockServer::start_async().await;
        mock_markets(&market).await;
        market
            .mock_async(|when, then| {
                when.method(GET).path("/simple/price");
                then.status(500);
            })
            .await;
        mock_insights(&ai).await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            market_gateway(&market),
            insights_client(&ai),
            dir.path().to_path_buf(),
        )
        .with_charts(false);

        let state = pipeline.run(2, "usd").await;

        assert_eq!(state.workflow_status, WorkflowStatus::Completed);
        assert_eq!(state.collection_status, StageStatus::Completed);
        assert!(!state.has_price_changes);
        assert!(state
            .warnings
            .iter()
            .any(|w| w.contains("price change data unavailable")));
        // analysis still ran, with the placeholder trends section
        let results = state.analysis_results.unwrap();
        assert!(results.price_trends.is_unavailable());
    }

    #[tokio::test]
    async fn insights_outage_falls_back_and_run_still_completes() {
        let market = MockServer::start_async().await;
        let ai = MockServer::start_async().await;
        mock_markets(&market).await;
        mock_price_changes(&market).await;
        ai.mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(500).body("model unavailable");
        })
        .await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            market_gateway(&market),
            insights_client(&ai),
            dir.path().to_path_buf(),
        )
        .with_charts(false);

        let state = pipeline.run(2, "usd").await;

        assert_eq!(state.workflow_status, WorkflowStatus::Completed);
        assert_eq!(state.insights_status, StageStatus::Failed);
        assert!(state.errors.iter().any(|e| e.starts_with("insights:")));
        // deterministic fallback filled the gap
        assert!(!state.insights.is_empty());
        assert!(state.insights[0].contains("2 cryptocurrencies"));
        // the report stage still ran after the insights failure
        assert_eq!(state.report_status, StageStatus::Completed);
    }
}

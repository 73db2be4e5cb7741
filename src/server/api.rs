use crate::models::AnalysisResults;
use crate::pipeline::{AnalysisState, WorkflowStatus};
use crate::server::AppState;
use axum::{
    extract::{Json, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

/// Request body for POST /analyze; every field has a sensible default so an
/// empty body is a valid request
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default = "default_num_coins")]
    pub num_coins: usize,
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,
}

fn default_num_coins() -> usize {
    10
}

fn default_vs_currency() -> String {
    "usd".to_string()
}

impl Default for AnalyzeRequest {
    fn default() -> Self {
        Self {
            num_coins: default_num_coins(),
            vs_currency: default_vs_currency(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub status: &'static str,
    pub message: String,
    pub data: AnalyzeData,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeData {
    pub analysis_results: Option<AnalysisResults>,
    pub crypto_count: usize,
    pub has_price_changes: bool,
    pub workflow_status: WorkflowStatus,
    pub insights: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_download_url: Option<String>,
    pub chart_count: usize,
}

/// Shape the final pipeline state into the API response
pub fn state_to_response(state: &AnalysisState) -> AnalyzeResponse {
    let status = if state.workflow_status == WorkflowStatus::Completed {
        "success"
    } else {
        "error"
    };

    let report_filename = state
        .report_path
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned());
    let report_download_url = report_filename
        .as_ref()
        .map(|name| format!("/reports/{}", name));

    AnalyzeResponse {
        status,
        message: format!(
            "Workflow processed {} cryptocurrencies",
            state.validated_data.len()
        ),
        data: AnalyzeData {
            analysis_results: state.analysis_results.clone(),
            crypto_count: state.validated_data.len(),
            has_price_changes: state.has_price_changes,
            workflow_status: state.workflow_status,
            insights: state.insights.clone(),
            report_filename,
            report_download_url,
            chart_count: state.chart_paths.len(),
        },
        warnings: state.warnings.clone(),
        errors: state.errors.clone(),
    }
}

/// POST /analyze - run the full analysis pipeline
#[instrument(skip(app_state, request))]
pub async fn analyze_handler(
    State(app_state): State<AppState>,
    request: Option<Json<AnalyzeRequest>>,
) -> impl IntoResponse {
    let Json(request) = request.unwrap_or_default();
    info!(
        num_coins = request.num_coins,
        vs_currency = %request.vs_currency,
        "received analyze request"
    );

    let state = app_state
        .pipeline
        .run(request.num_coins, &request.vs_currency)
        .await;

    Json(state_to_response(&state))
}

/// GET /health - liveness probe
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// GET / - service banner with the available routes
pub async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "crypto-analyst",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /analyze": "run the analysis pipeline",
            "GET /health": "liveness probe",
            "GET /reports/{filename}": "download generated reports",
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Stage, WorkflowStatus};
    use std::path::PathBuf;

    fn completed_state() -> AnalysisState {
        let mut state = AnalysisState::new(2, "usd");
        state.validated_data = vec![
            serde_json::from_value(serde_json::json!({
                "id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 65000.0
            }))
            .unwrap(),
        ];
        state.workflow_status = WorkflowStatus::Completed;
        state.mark_completed(Stage::DataCollection);
        state.report_path = Some(PathBuf::from("reports/crypto_analysis_20250101_000000.csv"));
        state
    }

    #[test]
    fn completed_run_maps_to_success() {
        let response = state_to_response(&completed_state());
        assert_eq!(response.status, "success");
        assert_eq!(response.message, "Workflow processed 1 cryptocurrencies");
        assert_eq!(
            response.data.report_download_url.as_deref(),
            Some("/reports/crypto_analysis_20250101_000000.csv")
        );
        assert_eq!(
            response.data.report_filename.as_deref(),
            Some("crypto_analysis_20250101_000000.csv")
        );
    }

    #[test]
    fn failed_run_maps_to_error_without_report_url() {
        let mut state = AnalysisState::new(10, "usd");
        state.workflow_status = WorkflowStatus::CompletedWithErrors;
        state.push_error(Stage::DataCollection, "provider unreachable");

        let response = state_to_response(&state);
        assert_eq!(response.status, "error");
        assert!(response.data.report_download_url.is_none());
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.data.crypto_count, 0);
    }

    #[test]
    fn empty_request_body_uses_defaults() {
        let request: AnalyzeRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.num_coins, 10);
        assert_eq!(request.vs_currency, "usd");
    }
}

//! Shared pipeline state.
//!
//! One mutable record is threaded through every stage of a run. Stages
//! execute strictly sequentially against it, so there is exactly one writer
//! at a time and no stage ever observes a partially-written update from
//! another stage.

use crate::models::{AnalysisResults, CoinRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

/// Outcome of a single pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Completed,
    Failed,
}

impl StageStatus {
    pub fn is_completed(self) -> bool {
        self == StageStatus::Completed
    }

    pub fn is_failed(self) -> bool {
        self == StageStatus::Failed
    }
}

/// Top-level verdict of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Starting,
    Completed,
    CompletedWithErrors,
}

/// Failure-handling policy attached to a stage at registration time.
///
/// Critical stages are fail-fast: their failure routes the run to the error
/// handler. Enrichment stages are fail-soft: a failure marks only their own
/// status and never alters the workflow verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    Critical,
    Enrichment,
}

/// Named unit of pipeline work operating on the shared state record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DataCollection,
    Analysis,
    Insights,
    Report,
    Charts,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::DataCollection => "data_collection",
            Stage::Analysis => "analysis",
            Stage::Insights => "insights",
            Stage::Report => "report",
            Stage::Charts => "charts",
        }
    }

    pub fn criticality(self) -> Criticality {
        match self {
            Stage::DataCollection | Stage::Analysis => Criticality::Critical,
            Stage::Insights | Stage::Report | Stage::Charts => Criticality::Enrichment,
        }
    }
}

/// The single mutable record threaded through every stage of one run.
///
/// Created fresh per request, mutated in place stage by stage, converted to
/// the API response at termination and then discarded. Nothing survives
/// between runs except files written as side effects.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisState {
    // Input parameters; set once, read-only thereafter
    pub num_coins: usize,
    pub vs_currency: String,

    /// Records exactly as fetched, never mutated after collection
    pub raw_data: Vec<Value>,
    /// Subset of `raw_data` that passed schema checks
    pub validated_data: Vec<CoinRecord>,

    pub analysis_results: Option<AnalysisResults>,
    pub insights: Vec<String>,
    pub report_path: Option<PathBuf>,
    pub chart_paths: Vec<PathBuf>,

    /// Whether any validated record carries a non-null 24h change.
    /// Set by data collection before analysis consults it.
    pub has_price_changes: bool,

    pub collection_status: StageStatus,
    pub analysis_status: StageStatus,
    pub insights_status: StageStatus,
    pub report_status: StageStatus,
    pub charts_status: StageStatus,
    pub workflow_status: WorkflowStatus,

    /// Non-fatal notices: validation rejections, degraded-data warnings
    pub warnings: Vec<String>,
    /// Stage failures, each prefixed with the stage that raised it
    pub errors: Vec<String>,

    /// Last-mutation time, refreshed by every stage on completion
    pub timestamp: DateTime<Utc>,
}

impl AnalysisState {
    pub fn new(num_coins: usize, vs_currency: impl Into<String>) -> Self {
        Self {
            num_coins,
            vs_currency: vs_currency.into(),
            raw_data: Vec::new(),
            validated_data: Vec::new(),
            analysis_results: None,
            insights: Vec::new(),
            report_path: None,
            chart_paths: Vec::new(),
            has_price_changes: false,
            collection_status: StageStatus::Pending,
            analysis_status: StageStatus::Pending,
            insights_status: StageStatus::Pending,
            report_status: StageStatus::Pending,
            charts_status: StageStatus::Pending,
            workflow_status: WorkflowStatus::Starting,
            warnings: Vec::new(),
            errors: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Refresh the last-mutation marker; called by every stage on completion
    pub fn touch(&mut self) {
        self.timestamp = Utc::now();
    }

    pub fn push_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn push_error(&mut self, stage: Stage, message: impl Into<String>) {
        self.errors.push(format!("{}: {}", stage.name(), message.into()));
    }

    pub fn status(&self, stage: Stage) -> StageStatus {
        match stage {
            Stage::DataCollection => self.collection_status,
            Stage::Analysis => self.analysis_status,
            Stage::Insights => self.insights_status,
            Stage::Report => self.report_status,
            Stage::Charts => self.charts_status,
        }
    }

    fn status_mut(&mut self, stage: Stage) -> &mut StageStatus {
        match stage {
            Stage::DataCollection => &mut self.collection_status,
            Stage::Analysis => &mut self.analysis_status,
            Stage::Insights => &mut self.insights_status,
            Stage::Report => &mut self.report_status,
            Stage::Charts => &mut self.charts_status,
        }
    }

    /// Mark a stage completed. A stage that already failed stays failed.
    pub fn mark_completed(&mut self, stage: Stage) {
        let status = self.status_mut(stage);
        if *status != StageStatus::Failed {
            *status = StageStatus::Completed;
        }
    }

    pub fn mark_failed(&mut self, stage: Stage) {
        *self.status_mut(stage) = StageStatus::Failed;
    }
}

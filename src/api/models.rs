use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ledger::{ReconciliationReport, ReconciliationResult};
use crate::reconcile::BalancePreview;

// ========== RESPONSE MODELS ==========

/// Batch recalculation response
#[derive(Debug, Serialize)]
pub struct RecalculateResponse {
    pub success: bool,
    pub message: String,
    pub succeeded: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<ReconciliationResult>,
}

impl From<ReconciliationReport> for RecalculateResponse {
    fn from(report: ReconciliationReport) -> Self {
        Self {
            success: true,
            message: report.summary(),
            succeeded: report.succeeded,
            failed: report.failed,
            started_at: report.started_at,
            finished_at: report.finished_at,
            results: report.results,
        }
    }
}

/// Single-account recalculation response
#[derive(Debug, Serialize)]
pub struct AccountRecalculateResponse {
    pub success: bool,
    pub result: ReconciliationResult,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub success: bool,
    #[serde(flatten)]
    pub preview: BalancePreview,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub timestamp: DateTime<Utc>,
}

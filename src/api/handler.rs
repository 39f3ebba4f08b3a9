use axum::{
    extract::{Path, State},
    Json
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::models::*;
use crate::{
    error::AppResult,
    ledger::LedgerStore,
    middleware::RateLimitLayer,
    reconcile::BatchOrchestrator,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub orchestrator: Arc<BatchOrchestrator>,
    pub rate_limiter: RateLimitLayer,
}

/// Recalculate every account balance from its transactions
/// GET|POST /accounts/recalculate-balances
///
/// Per-account failures are reported in `results` with a 200; only a
/// failure to list accounts turns into a 500.
pub async fn recalculate_balances(
    State(state): State<AppState>,
) -> AppResult<Json<RecalculateResponse>> {
    info!("Recalculating all account balances");

    let report = state.orchestrator.recalculate_all().await?;

    Ok(Json(RecalculateResponse::from(report)))
}

/// Recalculate one account
/// POST /accounts/:account_id/recalculate
pub async fn recalculate_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> AppResult<Json<AccountRecalculateResponse>> {
    info!("Recalculating balance for account {}", account_id);

    let result = state.orchestrator.reconcile_one(account_id).await?;

    Ok(Json(AccountRecalculateResponse {
        success: result.success,
        result,
    }))
}

/// Show stored vs computed balance without writing anything
/// GET /accounts/:account_id/reconciliation
pub async fn preview_reconciliation(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> AppResult<Json<PreviewResponse>> {
    let preview = state.orchestrator.preview(account_id).await?;

    if !preview.drift.is_zero() {
        info!(
            "Account {} drifted by {} ({} stored, {} computed)",
            account_id, preview.drift, preview.stored_balance, preview.computed_balance
        );
    }

    Ok(Json(PreviewResponse {
        success: true,
        preview,
    }))
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.store.ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            warn!("Health check database ping failed: {}", e);
            "unreachable".to_string()
        }
    };

    Json(HealthResponse {
        status: if database == "ok" {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        database,
        timestamp: Utc::now(),
    })
}

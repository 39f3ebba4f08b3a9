use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sqlx::migrate::MigrateError;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Per-account reconciliation errors.
///
/// These never fail a batch on their own: the orchestrator turns each one
/// into a failed result entry and moves on to the next account.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Transactions unavailable for account {account_id}: {}", .attempts.join("; "))]
    SourceUnavailable {
        account_id: Uuid,
        attempts: Vec<String>,
    },

    #[error("Failed to write balance for account {account_id}: {message}")]
    WriteFailed { account_id: Uuid, message: String },

    #[error("Account {0} not found")]
    AccountNotFound(Uuid),

    #[error("Reconciliation of account {account_id} timed out after {seconds}s")]
    Timeout { account_id: Uuid, seconds: u64 },

    #[error("Invalid amount in {table}: {value}")]
    InvalidAmount { table: &'static str, value: String },

    #[error("Unknown transaction type: {0}")]
    UnknownTransactionType(String),
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            AppError::Ledger(LedgerError::AccountNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "ACCOUNT_NOT_FOUND",
                format!("Account {} not found", id),
            ),
            AppError::Ledger(LedgerError::SourceUnavailable { .. }) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "TRANSACTIONS_UNAVAILABLE",
                self.to_string(),
            ),
            AppError::Ledger(LedgerError::Timeout { .. }) => (
                StatusCode::GATEWAY_TIMEOUT,
                "RECONCILIATION_TIMEOUT",
                self.to_string(),
            ),
            AppError::Ledger(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "LEDGER_ERROR",
                self.to_string(),
            ),
            AppError::Database(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                format!("A database error occurred: {}", e),
            ),
            AppError::Config(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                self.to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: message,
            error_code: error_code.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<MigrateError> for AppError {
    fn from(error: MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::calculator::{compute_balance, drift};
use super::reader::LedgerReader;
use super::writer::{BalanceWriter, RetryPolicy};
use crate::error::{AppResult, LedgerError};
use crate::ledger::{Account, LedgerStore, ReconciliationReport, ReconciliationResult, TransactionSource};

#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Accounts processed at once. 1 keeps the batch strictly sequential.
    pub concurrency: usize,
    /// Upper bound on one account's read + write
    pub account_timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            account_timeout: None,
            retry: RetryPolicy::none(),
        }
    }
}

/// What a reconciliation would do to one account, without writing it
#[derive(Debug, Clone, Serialize)]
pub struct BalancePreview {
    pub account_id: Uuid,
    pub account_name: String,
    pub opening_balance: Decimal,
    pub stored_balance: Decimal,
    pub computed_balance: Decimal,
    pub drift: Decimal,
    pub source: Option<TransactionSource>,
    pub transaction_count: usize,
    pub inconsistent_signs: usize,
}

/// Applies read → compute → write to every account, isolating failures
/// to the account they happened on.
pub struct BatchOrchestrator {
    store: Arc<dyn LedgerStore>,
    reader: LedgerReader,
    writer: BalanceWriter,
    settings: ReconcileSettings,
}

impl BatchOrchestrator {
    pub fn new(store: Arc<dyn LedgerStore>, settings: ReconcileSettings) -> Self {
        Self {
            reader: LedgerReader::new(store.clone()),
            writer: BalanceWriter::new(store.clone(), settings.retry),
            store,
            settings,
        }
    }

    /// Recompute and persist every account's balance.
    ///
    /// Only a failure to list accounts is returned as an error; anything
    /// that goes wrong for a single account becomes a failed result entry.
    pub async fn recalculate_all(&self) -> AppResult<ReconciliationReport> {
        let started_at = Utc::now();
        let accounts = self.store.list_accounts().await?;

        info!(
            "🔄 Reconciling {} accounts (concurrency {})",
            accounts.len(),
            self.settings.concurrency.max(1)
        );

        let results = if self.settings.concurrency <= 1 {
            let mut results = Vec::with_capacity(accounts.len());
            for account in &accounts {
                results.push(self.process(account).await);
            }
            results
        } else {
            // `buffered` keeps results in listing order
            stream::iter(accounts)
                .map(|account| async move { self.process(&account).await })
                .buffered(self.settings.concurrency)
                .collect::<Vec<_>>()
                .await
        };

        let report = ReconciliationReport::new(results, started_at);
        info!("✓ {}", report.summary());
        Ok(report)
    }

    /// Reconcile a single account. An unknown account is an error; other
    /// failures are reported in the result.
    pub async fn reconcile_one(&self, account_id: Uuid) -> AppResult<ReconciliationResult> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        Ok(self.process(&account).await)
    }

    pub async fn preview(&self, account_id: Uuid) -> AppResult<BalancePreview> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        let ledger = self.reader.read(account.id).await?;
        let computed = compute_balance(account.opening_balance, &ledger.transactions);

        Ok(BalancePreview {
            account_id: account.id,
            account_name: account.name,
            opening_balance: account.opening_balance,
            stored_balance: account.balance,
            computed_balance: computed,
            drift: drift(account.balance, computed),
            source: ledger.source,
            transaction_count: ledger.transactions.len(),
            inconsistent_signs: ledger
                .transactions
                .iter()
                .filter(|tx| !tx.sign_is_consistent())
                .count(),
        })
    }

    async fn process(&self, account: &Account) -> ReconciliationResult {
        let outcome = match self.settings.account_timeout {
            Some(limit) => tokio::time::timeout(limit, self.reconcile_account(account))
                .await
                .unwrap_or_else(|_| {
                    Err(LedgerError::Timeout {
                        account_id: account.id,
                        seconds: limit.as_secs(),
                    })
                }),
            None => self.reconcile_account(account).await,
        };

        match outcome {
            Ok(balance) => {
                info!("✅ {} ({}): balance {}", account.name, account.id, balance);
                ReconciliationResult::succeeded(account, balance)
            }
            Err(e) => {
                warn!("❌ {} ({}): {}", account.name, account.id, e);
                ReconciliationResult::failed(account, e)
            }
        }
    }

    async fn reconcile_account(&self, account: &Account) -> Result<Decimal, LedgerError> {
        let ledger = self.reader.read(account.id).await?;

        let inconsistent = ledger
            .transactions
            .iter()
            .filter(|tx| !tx.sign_is_consistent())
            .count();
        if inconsistent > 0 {
            warn!(
                "Account {} has {} transactions whose sign disagrees with their type",
                account.id, inconsistent
            );
        }

        let balance = compute_balance(account.opening_balance, &ledger.transactions);

        // Written even when unchanged so updated_at reflects the refresh
        self.writer.write(account.id, balance).await?;
        Ok(balance)
    }
}

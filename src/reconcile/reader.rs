use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use super::fallback::{FallbackChain, FallbackOutcome};
use crate::error::{AppError, LedgerError};
use crate::ledger::{Ledger, LedgerStore, TransactionSource};

/// Loads an account's posted transactions.
///
/// The ledger may live in either of two tables. Sources are tried in order
/// and the first one that returns rows is authoritative for the account;
/// rows from different sources are never merged.
pub struct LedgerReader {
    store: Arc<dyn LedgerStore>,
    sources: FallbackChain<TransactionSource>,
}

impl LedgerReader {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_sources(store, TransactionSource::ordered())
    }

    pub fn with_sources(store: Arc<dyn LedgerStore>, sources: Vec<TransactionSource>) -> Self {
        Self {
            store,
            sources: FallbackChain::new(sources),
        }
    }

    pub async fn read(&self, account_id: Uuid) -> Result<Ledger, LedgerError> {
        let store = &self.store;
        let outcome = self
            .sources
            .run(|source| async move {
                let rows = store.fetch_transactions(source, account_id).await?;
                Ok::<_, AppError>((!rows.is_empty()).then_some(rows))
            })
            .await;

        match outcome {
            FallbackOutcome::Found { strategy, value } => {
                debug!(
                    "Account {}: {} transactions from {}",
                    account_id,
                    value.len(),
                    strategy
                );
                Ok(Ledger {
                    account_id,
                    source: Some(strategy),
                    transactions: value,
                })
            }
            FallbackOutcome::Exhausted { failures, .. } if failures.is_empty() => {
                debug!("Account {}: no transactions in any source", account_id);
                Ok(Ledger::empty(account_id))
            }
            FallbackOutcome::Exhausted { answered, failures } => {
                // an empty answer proves nothing while another source is unreadable
                warn!(
                    "Account {}: {} transaction source(s) failed, {} empty",
                    account_id,
                    failures.len(),
                    answered
                );
                Err(LedgerError::SourceUnavailable {
                    account_id,
                    attempts: failures
                        .into_iter()
                        .map(|(source, message)| format!("{}: {}", source, message))
                        .collect(),
                })
            }
        }
    }
}

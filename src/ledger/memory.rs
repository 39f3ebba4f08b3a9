//! In-memory ledger store with failure injection, used by the tests.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::models::*;
use super::repository::LedgerStore;
use crate::error::{AppError, AppResult};

#[derive(Default)]
pub struct MemoryLedger {
    accounts: Mutex<Vec<Account>>,
    transactions: Mutex<HashMap<(TransactionSource, Uuid), Vec<Transaction>>>,
    failing_sources: Mutex<HashSet<(TransactionSource, Uuid)>>,
    failing_writes: Mutex<HashMap<Uuid, usize>>,
    slow_accounts: Mutex<HashMap<Uuid, Duration>>,
    list_fails: Mutex<bool>,
    pub writes: Mutex<Vec<(Uuid, Decimal)>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, name: &str, opening_balance: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        self.accounts.lock().push(Account {
            id,
            name: name.to_string(),
            opening_balance,
            balance: opening_balance,
            updated_at: Utc::now(),
        });
        id
    }

    pub fn post(
        &self,
        source: TransactionSource,
        account_id: Uuid,
        amount: Decimal,
        transaction_type: TransactionType,
    ) {
        self.transactions
            .lock()
            .entry((source, account_id))
            .or_default()
            .push(Transaction {
                id: Uuid::new_v4(),
                account_id,
                amount,
                transaction_type,
                created_at: Utc::now(),
            });
    }

    pub fn fail_source(&self, source: TransactionSource, account_id: Uuid) {
        self.failing_sources.lock().insert((source, account_id));
    }

    /// The next `times` writes for this account fail
    pub fn fail_writes(&self, account_id: Uuid, times: usize) {
        self.failing_writes.lock().insert(account_id, times);
    }

    pub fn slow_down(&self, account_id: Uuid, delay: Duration) {
        self.slow_accounts.lock().insert(account_id, delay);
    }

    pub fn fail_listing(&self) {
        *self.list_fails.lock() = true;
    }

    pub fn balance_of(&self, account_id: Uuid) -> Option<Decimal> {
        self.accounts
            .lock()
            .iter()
            .find(|a| a.id == account_id)
            .map(|a| a.balance)
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn list_accounts(&self) -> AppResult<Vec<Account>> {
        if *self.list_fails.lock() {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.accounts.lock().clone())
    }

    async fn get_account(&self, account_id: Uuid) -> AppResult<Option<Account>> {
        Ok(self
            .accounts
            .lock()
            .iter()
            .find(|a| a.id == account_id)
            .cloned())
    }

    async fn fetch_transactions(
        &self,
        source: TransactionSource,
        account_id: Uuid,
    ) -> AppResult<Vec<Transaction>> {
        let delay = self.slow_accounts.lock().get(&account_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_sources.lock().contains(&(source, account_id)) {
            return Err(AppError::Database(sqlx::Error::Protocol(format!(
                "relation \"{}\" does not exist",
                source.table()
            ))));
        }
        Ok(self
            .transactions
            .lock()
            .get(&(source, account_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn update_balance(&self, account_id: Uuid, balance: Decimal) -> AppResult<bool> {
        {
            let mut failing = self.failing_writes.lock();
            if let Some(remaining) = failing.get_mut(&account_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(AppError::Database(sqlx::Error::PoolTimedOut));
                }
            }
        }

        let mut accounts = self.accounts.lock();
        let Some(account) = accounts.iter_mut().find(|a| a.id == account_id) else {
            return Ok(false);
        };
        account.balance = balance;
        account.updated_at = Utc::now();
        self.writes.lock().push((account_id, balance));
        Ok(true)
    }
}

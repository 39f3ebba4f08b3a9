use super::models::*;
use crate::error::{AppResult, LedgerError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;
use tracing::debug;

/// The three operations reconciliation needs from the account store.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn list_accounts(&self) -> AppResult<Vec<Account>>;

    async fn get_account(&self, account_id: Uuid) -> AppResult<Option<Account>>;

    async fn fetch_transactions(
        &self,
        source: TransactionSource,
        account_id: Uuid,
    ) -> AppResult<Vec<Transaction>>;

    /// Sets `balance` and `updated_at` in one statement.
    /// Returns false when no row matched.
    async fn update_balance(&self, account_id: Uuid, balance: Decimal) -> AppResult<bool>;

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Postgres-backed ledger store - THE source of truth for balances
pub struct LedgerRepository {
    pub pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for LedgerRepository {
    // ========== ACCOUNT OPERATIONS ==========

    async fn list_accounts(&self) -> AppResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, name, opening_balance, balance, updated_at
            FROM accounts
            ORDER BY name, id
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        let accounts = rows
            .into_iter()
            .map(Account::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Loaded {} accounts", accounts.len());
        Ok(accounts)
    }

    async fn get_account(&self, account_id: Uuid) -> AppResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, name, opening_balance, balance, updated_at
            FROM accounts
            WHERE id = $1
            "#
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Account::try_from).transpose()?)
    }

    // ========== TRANSACTION OPERATIONS ==========

    async fn fetch_transactions(
        &self,
        source: TransactionSource,
        account_id: Uuid,
    ) -> AppResult<Vec<Transaction>> {
        // Table names come from a closed enum, never from input
        let sql = format!(
            "SELECT id, account_id, amount, transaction_type, created_at \
             FROM {} WHERE account_id = $1",
            source.table()
        );

        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;

        let transactions = rows
            .into_iter()
            .map(|row| row.into_transaction(source))
            .collect::<Result<Vec<_>, LedgerError>>()?;

        Ok(transactions)
    }

    // ========== BALANCE OPERATIONS ==========

    async fn update_balance(&self, account_id: Uuid, balance: Decimal) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = $2, updated_at = NOW()
            WHERE id = $1
            "#
        )
        .bind(account_id)
        .bind(to_big_decimal(balance)?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

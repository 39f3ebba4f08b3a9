use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::LedgerError;

/// Kind of posting. The amount stored alongside already carries its sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expenditure,
    TransferIn,
    TransferOut,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expenditure => "expenditure",
            TransactionType::TransferIn => "transfer_in",
            TransactionType::TransferOut => "transfer_out",
        }
    }

    /// Inflows are stored positive, outflows negative
    pub fn is_inflow(&self) -> bool {
        matches!(self, TransactionType::Income | TransactionType::TransferIn)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(TransactionType::Income),
            "expenditure" | "expense" => Ok(TransactionType::Expenditure),
            "transfer_in" => Ok(TransactionType::TransferIn),
            "transfer_out" => Ok(TransactionType::TransferOut),
            other => Err(LedgerError::UnknownTransactionType(other.to_string())),
        }
    }
}

/// Account entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub opening_balance: Decimal,
    /// Derived: opening_balance plus every posted amount
    pub balance: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Posted transaction. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Whether the stored sign agrees with the transaction type.
    /// Zero amounts are accepted for every type.
    pub fn sign_is_consistent(&self) -> bool {
        if self.amount.is_zero() {
            return true;
        }
        self.transaction_type.is_inflow() == self.amount.is_sign_positive()
    }
}

/// Physical table a ledger can be read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    AccountTxTable,
    AccountTransactions,
}

impl TransactionSource {
    pub fn table(&self) -> &'static str {
        match self {
            TransactionSource::AccountTxTable => "account_tx_table",
            TransactionSource::AccountTransactions => "account_transactions",
        }
    }

    /// Primary first, legacy second
    pub fn ordered() -> Vec<TransactionSource> {
        vec![
            TransactionSource::AccountTxTable,
            TransactionSource::AccountTransactions,
        ]
    }
}

impl fmt::Display for TransactionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

/// The transactions of one account, as read from a single source.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub account_id: Uuid,
    /// `None` when every answering source was empty
    pub source: Option<TransactionSource>,
    pub transactions: Vec<Transaction>,
}

impl Ledger {
    pub fn empty(account_id: Uuid) -> Self {
        Self {
            account_id,
            source: None,
            transactions: Vec::new(),
        }
    }
}

/// Outcome of reconciling one account. Built per batch, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    pub account_id: Uuid,
    pub account_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReconciliationResult {
    pub fn succeeded(account: &Account, new_balance: Decimal) -> Self {
        Self {
            account_id: account.id,
            account_name: account.name.clone(),
            success: true,
            new_balance: Some(new_balance),
            error: None,
        }
    }

    pub fn failed(account: &Account, error: impl fmt::Display) -> Self {
        Self {
            account_id: account.id,
            account_name: account.name.clone(),
            success: false,
            new_balance: None,
            error: Some(error.to_string()),
        }
    }
}

/// Aggregate of one batch run
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub results: Vec<ReconciliationResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn new(results: Vec<ReconciliationResult>, started_at: DateTime<Utc>) -> Self {
        let failed = results.iter().filter(|r| !r.success).count();
        Self {
            succeeded: results.len() - failed,
            failed,
            results,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "Recalculated balances for {} accounts ({} failed)",
            self.total(),
            self.failed
        )
    }
}

// ========== ROW MAPPING ==========

/// NUMERIC columns arrive as BigDecimal; the ledger works in rust_decimal.
pub fn to_decimal(value: &BigDecimal, table: &'static str) -> Result<Decimal, LedgerError> {
    let text = value.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| LedgerError::InvalidAmount { table, value: text })
}

pub fn to_big_decimal(value: Decimal) -> Result<BigDecimal, LedgerError> {
    BigDecimal::from_str(&value.to_string()).map_err(|_| LedgerError::InvalidAmount {
        table: "accounts",
        value: value.to_string(),
    })
}

#[derive(Debug, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub name: String,
    pub opening_balance: Option<BigDecimal>,
    pub balance: Option<BigDecimal>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = LedgerError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let opening_balance = match &row.opening_balance {
            Some(v) => to_decimal(v, "accounts")?,
            None => Decimal::ZERO,
        };
        let balance = match &row.balance {
            Some(v) => to_decimal(v, "accounts")?,
            None => opening_balance,
        };
        Ok(Account {
            id: row.id,
            name: row.name,
            opening_balance,
            balance,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount: BigDecimal,
    pub transaction_type: String,
    pub created_at: DateTime<Utc>,
}

impl TransactionRow {
    pub fn into_transaction(self, source: TransactionSource) -> Result<Transaction, LedgerError> {
        Ok(Transaction {
            id: self.id,
            account_id: self.account_id,
            amount: to_decimal(&self.amount, source.table())?,
            transaction_type: self.transaction_type.parse()?,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn tx(amount: Decimal, transaction_type: TransactionType) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            account_id: Uuid::nil(),
            amount,
            transaction_type,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[case("income", TransactionType::Income)]
    #[case("Expenditure", TransactionType::Expenditure)]
    #[case("expense", TransactionType::Expenditure)]
    #[case(" transfer_in ", TransactionType::TransferIn)]
    #[case("transfer_out", TransactionType::TransferOut)]
    fn test_parse_transaction_type(#[case] raw: &str, #[case] expected: TransactionType) {
        assert_eq!(raw.parse::<TransactionType>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_transaction_type() {
        assert!(matches!(
            "refund".parse::<TransactionType>(),
            Err(LedgerError::UnknownTransactionType(t)) if t == "refund"
        ));
    }

    #[rstest]
    #[case(dec!(50.00), TransactionType::Income, true)]
    #[case(dec!(-20.00), TransactionType::Expenditure, true)]
    #[case(dec!(20.00), TransactionType::Expenditure, false)]
    #[case(dec!(-5), TransactionType::TransferIn, false)]
    #[case(dec!(0), TransactionType::TransferOut, true)]
    fn test_sign_consistency(
        #[case] amount: Decimal,
        #[case] kind: TransactionType,
        #[case] consistent: bool,
    ) {
        assert_eq!(tx(amount, kind).sign_is_consistent(), consistent);
    }

    #[test]
    fn test_report_counts_and_summary() {
        let account = Account {
            id: Uuid::new_v4(),
            name: "General Fund".into(),
            opening_balance: dec!(0),
            balance: dec!(0),
            updated_at: Utc::now(),
        };
        let report = ReconciliationReport::new(
            vec![
                ReconciliationResult::succeeded(&account, dec!(10)),
                ReconciliationResult::failed(&account, "boom"),
                ReconciliationResult::succeeded(&account, dec!(20)),
            ],
            Utc::now(),
        );

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.summary(), "Recalculated balances for 3 accounts (1 failed)");
    }

    #[test]
    fn test_result_serialization_shape() {
        let account = Account {
            id: Uuid::nil(),
            name: "Building Fund".into(),
            opening_balance: dec!(0),
            balance: dec!(0),
            updated_at: Utc::now(),
        };
        let ok = serde_json::to_value(ReconciliationResult::succeeded(&account, dec!(1234.56))).unwrap();
        assert_eq!(ok["new_balance"], serde_json::json!(1234.56));
        assert!(ok.get("error").is_none());

        let failed = serde_json::to_value(ReconciliationResult::failed(&account, "down")).unwrap();
        assert_eq!(failed["success"], false);
        assert_eq!(failed["error"], "down");
        assert!(failed.get("new_balance").is_none());
    }

    #[test]
    fn test_account_row_defaults_balance_to_opening() {
        let row = AccountRow {
            id: Uuid::nil(),
            name: "Missions".into(),
            opening_balance: Some(BigDecimal::from_str("500.00").unwrap()),
            balance: None,
            updated_at: Utc::now(),
        };
        let account = Account::try_from(row).unwrap();
        assert_eq!(account.opening_balance, dec!(500.00));
        assert_eq!(account.balance, dec!(500.00));
    }
}

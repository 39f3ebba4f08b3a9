pub mod models;
pub mod repository;
#[cfg(test)]
pub mod memory;

pub use models::{Account, Ledger, ReconciliationReport, ReconciliationResult, Transaction, TransactionSource, TransactionType};
pub use repository::{LedgerRepository, LedgerStore};

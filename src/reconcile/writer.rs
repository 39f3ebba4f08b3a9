use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::LedgerStore;

/// Retry behaviour for balance writes.
///
/// `max_attempts = 1` means a single try with no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Exponential backoff: base, 2*base, 4*base, ...
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Persists a recomputed balance together with its audit timestamp.
pub struct BalanceWriter {
    store: Arc<dyn LedgerStore>,
    retry: RetryPolicy,
}

impl BalanceWriter {
    pub fn new(store: Arc<dyn LedgerStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub async fn write(&self, account_id: Uuid, balance: Decimal) -> Result<(), LedgerError> {
        let mut attempt = 1;
        loop {
            match self.store.update_balance(account_id, balance).await {
                Ok(true) => return Ok(()),
                // A missing row will not appear on retry
                Ok(false) => return Err(LedgerError::AccountNotFound(account_id)),
                Err(e) if attempt < self.retry.max_attempts => {
                    attempt += 1;
                    let delay = self.retry.delay_before(attempt);
                    warn!(
                        "Balance write for {} failed ({}), retrying in {:?} (attempt {}/{})",
                        account_id, e, delay, attempt, self.retry.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(LedgerError::WriteFailed {
                        account_id,
                        message: e.to_string(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::MemoryLedger;
    use rust_decimal_macros::dec;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.delay_before(2), Duration::from_millis(100));
        assert_eq!(policy.delay_before(3), Duration::from_millis(200));
        assert_eq!(policy.delay_before(4), Duration::from_millis(400));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_write_updates_balance() {
        let store = Arc::new(MemoryLedger::new());
        let id = store.add_account("General", dec!(0));
        let writer = BalanceWriter::new(store.clone(), RetryPolicy::none());

        writer.write(id, dec!(42.10)).await.unwrap();
        assert_eq!(store.balance_of(id), Some(dec!(42.10)));
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let store = Arc::new(MemoryLedger::new());
        let id = store.add_account("General", dec!(0));
        store.fail_writes(id, 1);
        let writer = BalanceWriter::new(store.clone(), RetryPolicy::default());

        let err = writer.write(id, dec!(1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::WriteFailed { account_id, .. } if account_id == id));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let store = Arc::new(MemoryLedger::new());
        let id = store.add_account("General", dec!(0));
        store.fail_writes(id, 2);
        let writer = BalanceWriter::new(store.clone(), RetryPolicy::new(3, Duration::from_millis(50)));

        writer.write(id, dec!(9)).await.unwrap();
        assert_eq!(store.balance_of(id), Some(dec!(9)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted() {
        let store = Arc::new(MemoryLedger::new());
        let id = store.add_account("General", dec!(5));
        store.fail_writes(id, 3);
        let writer = BalanceWriter::new(store.clone(), RetryPolicy::new(3, Duration::from_millis(50)));

        let err = writer.write(id, dec!(9)).await.unwrap_err();
        assert!(matches!(err, LedgerError::WriteFailed { account_id, .. } if account_id == id));
        assert_eq!(store.balance_of(id), Some(dec!(5)));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_account() {
        let store = Arc::new(MemoryLedger::new());
        let writer = BalanceWriter::new(store, RetryPolicy::new(3, Duration::ZERO));
        let id = Uuid::new_v4();

        let err = writer.write(id, dec!(1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(missing) if missing == id));
    }
}

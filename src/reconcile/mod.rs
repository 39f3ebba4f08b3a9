// Balance reconciliation: read ledger -> compute -> write, per account
pub mod calculator;
pub mod fallback;
pub mod orchestrator;
pub mod reader;
pub mod scheduler;
pub mod writer;

pub use orchestrator::{BalancePreview, BatchOrchestrator, ReconcileSettings};
pub use writer::RetryPolicy;

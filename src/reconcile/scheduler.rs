// Reconciliation scheduler - re-runs the balance batch in the background
//
// Two modes:
// - Interval: every N seconds, first run after one full interval
// - Daily: once per day at a fixed UTC hour (off-peak)

use chrono::{DateTime, TimeZone, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};
use std::sync::Arc;

use super::orchestrator::BatchOrchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleFrequency {
    Interval(Duration),
    /// UTC hour (0-23)
    Daily(u32),
}

/// Background driver for `BatchOrchestrator::recalculate_all`
pub struct ReconcileScheduler {
    frequency: ScheduleFrequency,
    orchestrator: Arc<BatchOrchestrator>,
}

impl ReconcileScheduler {
    pub fn new(frequency: ScheduleFrequency, orchestrator: Arc<BatchOrchestrator>) -> Self {
        Self {
            frequency,
            orchestrator,
        }
    }

    /// Start the scheduler (runs in background)
    pub fn start(&self) -> JoinHandle<()> {
        let frequency = self.frequency;
        let orchestrator = self.orchestrator.clone();

        tokio::spawn(async move {
            match frequency {
                ScheduleFrequency::Interval(period) => {
                    Self::run_interval_scheduler(period, &orchestrator).await
                }
                ScheduleFrequency::Daily(hour) => {
                    Self::run_daily_scheduler(hour, &orchestrator).await
                }
            }
        })
    }

    async fn run_interval_scheduler(period: Duration, orchestrator: &Arc<BatchOrchestrator>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            Self::run_once(orchestrator).await;
        }
    }

    async fn run_daily_scheduler(hour: u32, orchestrator: &Arc<BatchOrchestrator>) {
        loop {
            let now = Utc::now();
            let Some(next) = Self::calculate_next_daily_execution(now, hour) else {
                error!("Invalid reconciliation hour {}, daily scheduler stopped", hour);
                return;
            };
            let wait = next.signed_duration_since(now);

            info!("⏰ Next reconciliation scheduled for: {} UTC", next.format("%Y-%m-%d %H:%M:%S"));
            if let Ok(wait) = wait.to_std() {
                tokio::time::sleep(wait).await;
            }

            Self::run_once(orchestrator).await;
        }
    }

    async fn run_once(orchestrator: &Arc<BatchOrchestrator>) {
        info!("🔄 Starting scheduled reconciliation");
        match orchestrator.recalculate_all().await {
            Ok(report) => info!(
                "✓ Scheduled reconciliation: {} in {}ms (finished {})",
                report.summary(),
                (report.finished_at - report.started_at).num_milliseconds(),
                report.finished_at.format("%Y-%m-%d %H:%M:%S")
            ),
            Err(e) => error!("❌ Scheduled reconciliation failed: {}", e),
        }
    }

    /// Next occurrence of `hour`:00:00 UTC strictly after `now`
    fn calculate_next_daily_execution(now: DateTime<Utc>, hour: u32) -> Option<DateTime<Utc>> {
        let today = Utc.from_utc_datetime(&now.date_naive().and_hms_opt(hour, 0, 0)?);
        if today > now {
            return Some(today);
        }
        let tomorrow = now.date_naive().succ_opt()?.and_hms_opt(hour, 0, 0)?;
        Some(Utc.from_utc_datetime(&tomorrow))
    }
}

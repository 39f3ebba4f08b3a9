use std::time::Duration;

use serde::Deserialize;

use crate::reconcile::{scheduler::ScheduleFrequency, ReconcileSettings, RetryPolicy};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub max_connections: u32,
    pub run_migrations: bool,

    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    /// Key the rate limiter on X-Forwarded-For (only behind a trusted proxy)
    pub trust_forwarded_for: bool,
    pub request_timeout_secs: u64,
    /// Comma separated; empty allows any origin
    pub allowed_origins: String,

    pub reconcile_concurrency: usize,
    pub account_timeout_secs: Option<u64>,
    pub write_max_attempts: u32,
    pub write_retry_delay_ms: u64,

    pub schedule_interval_secs: Option<u64>,
    pub schedule_daily_hour: Option<u32>,
}

impl Config {
    /// Defaults, then `ledger.toml` if present, then the environment
    /// (`DATABASE_URL`, `BIND_ADDRESS`, ...).
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let builder = Self::defaults()?
            .add_source(config::File::with_name("ledger").required(false))
            .add_source(config::Environment::default().try_parsing(true));

        Self::from_builder(builder)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("database_url", "postgresql://localhost/church_ledger")?
            .set_default("bind_address", "0.0.0.0:8080")?
            .set_default("max_connections", 10)?
            .set_default("run_migrations", true)?
            .set_default("rate_limit_requests", 30)?
            .set_default("rate_limit_window_secs", 60)?
            .set_default("trust_forwarded_for", false)?
            .set_default("request_timeout_secs", 120)?
            .set_default("allowed_origins", "")?
            .set_default("reconcile_concurrency", 1)?
            .set_default("write_max_attempts", 1)?
            .set_default("write_retry_delay_ms", 200)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, config::ConfigError> {
        let settings: Self = builder.build()?.try_deserialize()?;

        if let Some(hour) = settings.schedule_daily_hour {
            if hour > 23 {
                return Err(config::ConfigError::Message(format!(
                    "schedule_daily_hour must be 0-23, got {}",
                    hour
                )));
            }
        }

        Ok(settings)
    }

    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            concurrency: self.reconcile_concurrency.max(1),
            account_timeout: self.account_timeout_secs.map(Duration::from_secs),
            retry: RetryPolicy::new(
                self.write_max_attempts,
                Duration::from_millis(self.write_retry_delay_ms),
            ),
        }
    }

    /// Interval wins over daily when both are set
    pub fn schedule(&self) -> Option<ScheduleFrequency> {
        match (self.schedule_interval_secs, self.schedule_daily_hour) {
            (Some(secs), _) if secs > 0 => Some(ScheduleFrequency::Interval(Duration::from_secs(secs))),
            (_, Some(hour)) => Some(ScheduleFrequency::Daily(hour)),
            _ => None,
        }
    }

    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect()
    }
}

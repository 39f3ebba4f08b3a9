use std::{sync::Arc, time::Duration};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;
use crate::{
    api::handler::AppState,
    config::Config,
    error::AppResult,
    ledger::{LedgerRepository, LedgerStore},
    middleware::RateLimitLayer,
    reconcile::{BatchOrchestrator, scheduler::ReconcileScheduler},
};

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    // Database pool
    let pool = initialize_database(config).await?;

    // Core components
    let store: Arc<dyn LedgerStore> = Arc::new(LedgerRepository::new(pool));

    let settings = config.reconcile_settings();
    info!(
        "✅ Reconciliation: concurrency {}, account timeout {:?}, write attempts {}",
        settings.concurrency, settings.account_timeout, settings.retry.max_attempts
    );
    let orchestrator = Arc::new(BatchOrchestrator::new(store.clone(), settings));

    let rate_limiter = RateLimitLayer::new(config.rate_limit_requests, config.rate_limit_window_secs)?
        .with_forwarded_for(config.trust_forwarded_for);
    info!(
        "✅ Rate limiter: {} requests per {}s per client",
        config.rate_limit_requests, config.rate_limit_window_secs
    );

    // Sweep recovered rate-limit entries (every 10 minutes)
    let sweeper = rate_limiter.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(600)).await;
            sweeper.sweep();
        }
    });

    match config.schedule() {
        Some(frequency) => {
            ReconcileScheduler::new(frequency, orchestrator.clone()).start();
            info!("✅ Scheduled reconciliation started: {:?}", frequency);
        }
        None => info!("Scheduled reconciliation disabled"),
    }

    Ok(AppState {
        store,
        orchestrator,
        rate_limiter,
    })
}

async fn initialize_database(config: &Config) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    info!("✓ Database pool configured: {} max connections", config.max_connections.max(1));

    if config.run_migrations {
        info!("🔄 Running database migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    info!("✓ Database initialized");
    Ok(pool)
}

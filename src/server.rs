use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Router, http::StatusCode, middleware::from_fn_with_state, routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use crate::{
    api::handler::{AppState, health_check, preview_reconciliation, recalculate_account, recalculate_balances},
    config::Config,
    middleware::{create_cors_layer, rate_limit_middleware},
};

/// HTTP-level knobs, split from `Config` so routers can be built in tests
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub request_timeout: Duration,
    pub allowed_origins: Vec<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            allowed_origins: Vec::new(),
        }
    }
}

impl From<&Config> for HttpSettings {
    fn from(config: &Config) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
            allowed_origins: config.origins(),
        }
    }
}

pub fn create_app(state: AppState, settings: &HttpSettings) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let api_v1 = Router::new()
        .route(
            "/accounts/recalculate-balances",
            get(recalculate_balances).post(recalculate_balances),
        )
        .route("/accounts/:account_id/recalculate", post(recalculate_account))
        .route("/accounts/:account_id/reconciliation", get(preview_reconciliation))
        .route_layer(from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    let app = Router::new()
        // Public health check endpoint
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(&settings.allowed_origins))
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    settings.request_timeout,
                )),
        )
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(
    app: Router,
    bind_address: &str,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

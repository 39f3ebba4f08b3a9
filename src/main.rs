mod error;
mod api;
mod ledger;
mod reconcile;
mod server;
mod bootstrap;
mod middleware;
mod config;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing::info;

use crate::config::Config;
use crate::server::HttpSettings;

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,church_ledger=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenv::dotenv().ok();
    init_tracing();

    info!("🚀 Starting church ledger reconciliation service");

    let config = Config::from_env()?;

    let state = bootstrap::initialize_app_state(&config).await?;

    // Create HTTP server
    let app = server::create_app(state, &HttpSettings::from(&config));

    // Run the Server
    server::run_server(app, &config.bind_address).await?;

    Ok(())
}

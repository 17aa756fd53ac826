#![forbid(unsafe_code)]

use tokio::signal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use travel_adapter::{config::AdapterConfig, router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = AdapterConfig::from_env()?;
    let state = AppState::from_config(&config)?;
    let app = router(state);

    tracing::info!(
        addr = %config.bind,
        store = ?config.store,
        keywords_enabled = config.keywords.is_some(),
        hotel_search_enabled = config.hotels.is_some(),
        "travel_adapter_http listening"
    );
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("travel_adapter_http stopped");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::warn!(error = %err, "ctrl-c handler unavailable, serving until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use accountant_server::{app_router, build_state, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().context("Invalid server configuration")?;
    let state = build_state(&config).context("Failed to initialize storage")?;
    let app = app_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!("Listening on {}", config.listen_addr);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

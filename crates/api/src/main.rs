use anyhow::Context;

use inkwell_api::config::{AppConfig, DEV_JWT_SECRET};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    inkwell_observability::init();

    let config = AppConfig::from_env()?;
    if config.jwt_secret == DEV_JWT_SECRET {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
    }

    let app = inkwell_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %listener.local_addr()?, store = %config.store_name, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

use anyhow::Context;

use invcfg_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    invcfg_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let app = invcfg_api::app::build_app(&config)
        .await
        .context("failed to initialise rule store")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

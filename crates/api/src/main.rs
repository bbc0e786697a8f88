use anyhow::Context;

use stockcast_infra::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockcast_observability::init();

    let config = Config::from_env().context("failed to load configuration")?;
    match config.train_cutoff {
        Some(cutoff) => tracing::info!(%cutoff, "training cutoff fixed by configuration"),
        None => tracing::info!("training cutoff follows the current month"),
    }

    let services = stockcast_api::app::services::build_services(&config)
        .context("failed to set up the ticket source")?;
    let app = stockcast_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

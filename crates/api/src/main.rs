use anyhow::Context;

use quill_api::app::{build_app, services};
use quill_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env().context("invalid configuration")?;
    quill_observability::init(config.log_format);

    let services = services::build_services(&config).await?;
    let app = build_app(services, config.jwt_secret());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

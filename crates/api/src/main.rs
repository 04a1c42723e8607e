use std::sync::Arc;

use anyhow::Context;

use solderp_api::app::{build_app, services};
use solderp_infra::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    solderp_observability::init();

    let config = Config::from_env().context("invalid configuration")?;
    let services = services::build_services(&config)
        .await
        .with_context(|| format!("failed to open database {}", config.database.url))?;

    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

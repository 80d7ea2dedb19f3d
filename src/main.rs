//! Storefront Tagging - demo storefront API server

use anyhow::{Context, Result};
use storefront_tagging::http::{router, AppState};
use storefront_tagging::{Catalog, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;
    let port = config.port;
    let catalog = Catalog::demo();
    tracing::info!(products = catalog.len(), currency = config.currency.code(), "catalog loaded");
    let app = router(AppState::new(config, catalog));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await.with_context(|| format!("binding port {port}"))?;
    tracing::info!("Storefront tagging listening on 0.0.0.0:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

// Shop Catalog - Web Server
// REST API with Axum over the SQLite catalog

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shop_catalog::{api, Config, Database};

const DEFAULT_LOG_FILTER: &str = "shop_catalog=info,shop_server=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Config::from_env()?;
    let db = Database::open(&config.db)?;
    info!(db = ?config.db, "database opened");

    let app = api::router(db);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(%addr, version = shop_catalog::VERSION, "shop server listening");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

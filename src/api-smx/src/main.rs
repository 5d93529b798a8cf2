use std::sync::Arc;

use core_smx::common::env::{config_path_from_env, get_server_address};
use core_smx::common::logging::setup_logging;
use core_smx::sitemap::{HttpFetcher, SitemapConfig, SitemapGenerator};

use api_smx::routes;

async fn serve() -> anyhow::Result<()> {
    let config_path = config_path_from_env();
    let config = if config_path.is_file() {
        SitemapConfig::load(&config_path)?
    } else {
        tracing::warn!("No config at {}, using defaults", config_path.display());
        let mut config = SitemapConfig::default();
        config.apply_env();
        config
    };

    let generator = SitemapGenerator::new(config, Arc::new(HttpFetcher::default()))?;
    let app = routes::router().with_state(Arc::new(generator));

    let addr = get_server_address()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Serving sitemaps on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    setup_logging("api_smx=debug,core_smx=info,tower_http=debug");

    if let Err(e) = serve().await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

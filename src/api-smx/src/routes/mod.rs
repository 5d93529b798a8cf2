use std::sync::Arc;

use axum::{Router, http::StatusCode, middleware, routing::get};
use tower_http::trace::TraceLayer;

use core_smx::SitemapGenerator;
use core_smx::sitemap::xsl::STYLESHEET_PATH;

pub mod logging_middleware;
pub mod sitemap;

/// Shared state: the generator every request renders with.
pub type AppState = Arc<SitemapGenerator>;

pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "healthy")
}

//
// Router
//

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/sitemap.xml", get(sitemap::get_sitemap))
        .route("/sitemap_index.xml", get(sitemap::get_sitemap_index))
        .route(STYLESHEET_PATH, get(sitemap::get_stylesheet))
        // `{name}-sitemap.xml` shards
        .route("/{file}", get(sitemap::get_shard))
        // Custom route access logging
        .layer(middleware::from_fn(logging_middleware::log_route_access))
        // Tracing middleware
        .layer(TraceLayer::new_for_http())
}

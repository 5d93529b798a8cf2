use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use core_smx::SitemapError;

/// Failure while rendering a sitemap for a request.
#[derive(Debug)]
pub struct ApiError(pub SitemapError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("Sitemap rendering failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": self.0.to_string()
            })),
        )
            .into_response()
    }
}

impl From<SitemapError> for ApiError {
    fn from(err: SitemapError) -> Self {
        Self(err)
    }
}

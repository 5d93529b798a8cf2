//! Sitemap documents rendered per request.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;

use core_smx::SitemapError;
use core_smx::sitemap::SitemapConfig;
use core_smx::sitemap::config::DEFAULT_XSL;
use core_smx::sitemap::generator::{SITEMAP_INDEX_FILE, shard_file_name};
use core_smx::sitemap::xsl::generate_xsl_stylesheet;
use core_smx::url_utils::with_base;

use crate::errors::ApiError;
use crate::routes::AppState;

const XML_CONTENT_TYPE: &str = "text/xml; charset=UTF-8";
const XSL_CONTENT_TYPE: &str = "text/xsl; charset=UTF-8";
const CACHE_CONTROL: &str = "max-age=600, must-revalidate";

fn header_value<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Origin the request was made to, honouring proxy headers. Local hosts
/// default to `http`, everything else to `https`.
pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    let host = header_value(headers, "x-forwarded-host").or_else(|| header_value(headers, header::HOST))?;
    let proto = header_value(headers, "x-forwarded-proto").unwrap_or(
        if host.starts_with("localhost") || host.starts_with("127.0.0.1") {
            "http"
        } else {
            "https"
        },
    );
    Some(format!("{proto}://{host}"))
}

/// The generator's config with `host` set to the request origin.
/// `Ok(None)` when sitemaps are disabled.
fn request_config(state: &AppState, headers: &HeaderMap) -> Result<Option<SitemapConfig>, ApiError> {
    let mut config = state.config().clone();
    if !config.enabled {
        return Ok(None);
    }
    if config.site_url.is_empty() {
        return Err(SitemapError::MissingSiteUrl.into());
    }
    if let Some(origin) = request_origin(headers) {
        config.host = Some(origin);
    }
    Ok(Some(config))
}

fn xml_response(xml: String) -> Response {
    (
        [(header::CONTENT_TYPE, XML_CONTENT_TYPE), (header::CACHE_CONTROL, CACHE_CONTROL)],
        xml,
    )
        .into_response()
}

/// GET /sitemap.xml - the single sitemap, or a redirect to the index when sharded
pub async fn get_sitemap(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let Some(config) = request_config(&state, &headers)? else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    if config.sitemaps.is_sharded() {
        let location = with_base(&format!("/{SITEMAP_INDEX_FILE}"), &config.base_url);
        tracing::debug!("Sharded sitemaps, redirecting to {}", location);
        return Ok((StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response());
    }

    let xml = state.sitemap_xml(&config, Utc::now()).await?;
    Ok(xml_response(xml))
}

/// GET /sitemap_index.xml - the index of every shard
pub async fn get_sitemap_index(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let Some(config) = request_config(&state, &headers)? else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    if !config.sitemaps.is_sharded() {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let (index, shards) = state.sitemap_index(&config, Utc::now()).await?;
    tracing::debug!("Sitemap index lists {} shards", shards.len());
    Ok(xml_response(index.xml))
}

/// GET /{name}-sitemap.xml - one shard
pub async fn get_shard(
    State(state): State<AppState>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Some(name) = file.strip_suffix(shard_file_name("").as_str()) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let Some(config) = request_config(&state, &headers)? else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    match state.shard_xml(&config, name, Utc::now()).await? {
        Some(xml) => Ok(xml_response(xml)),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

/// GET /__sitemap__/style.xsl
pub async fn get_stylesheet(State(state): State<AppState>) -> Response {
    if state.config().xsl.as_deref() != Some(DEFAULT_XSL) {
        return StatusCode::NOT_FOUND.into_response();
    }
    (
        [(header::CONTENT_TYPE, XSL_CONTENT_TYPE), (header::CACHE_CONTROL, CACHE_CONTROL)],
        generate_xsl_stylesheet(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_origin() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_origin(&headers), None);

        headers.insert(header::HOST, HeaderValue::from_static("localhost:3000"));
        assert_eq!(request_origin(&headers).as_deref(), Some("http://localhost:3000"));

        headers.insert(header::HOST, HeaderValue::from_static("internal:8080"));
        assert_eq!(request_origin(&headers).as_deref(), Some("https://internal:8080"));

        headers.insert("x-forwarded-host", HeaderValue::from_static("site.com, proxy.local"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
        assert_eq!(request_origin(&headers).as_deref(), Some("http://site.com"));
    }
}

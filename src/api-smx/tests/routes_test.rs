//! Integration tests for the sitemap routes
//!
//! Tests key endpoints:
//! - GET /sitemap.xml - Single sitemap, or redirect when sharded
//! - GET /sitemap_index.xml - Index of shards
//! - GET /{name}-sitemap.xml - One shard
//! - GET /__sitemap__/style.xsl - Stylesheet
//! - GET /health

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use quick_xml::Reader;
use quick_xml::events::Event;
use tower::ServiceExt;

use api_smx::routes::router;
use core_smx::sitemap::sources::mock::MockFetcher;
use core_smx::sitemap::{NamedShard, ShardOverrides, ShardsConfig, SitemapConfig, SitemapGenerator};

/// Helper to create a router around a generator with a mock fetcher
fn test_router(config: SitemapConfig, fetcher: Arc<MockFetcher>) -> axum::Router {
    let generator = SitemapGenerator::new(config, fetcher).unwrap();
    router().with_state(Arc::new(generator))
}

fn base_config() -> core_smx::sitemap::config::SitemapConfigBuilder {
    SitemapConfig::builder()
        .site_url("https://site.com")
        .auto_lastmod(false)
        .xsl(None)
}

async fn get(app: axum::Router, uri: &str) -> axum::response::Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// Helper to read a response body as text
async fn body_text(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Text of every element named `name`, failing on malformed XML.
fn element_texts(xml: &str, name: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut texts = Vec::new();
    let mut inside = false;
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) => inside = e.name().as_ref() == name.as_bytes(),
            Event::Text(t) if inside => texts.push(t.unescape().unwrap().into_owned()),
            Event::End(_) => inside = false,
            Event::Eof => break,
            _ => {}
        }
    }
    texts
}

#[tokio::test]
async fn test_health() {
    let app = test_router(base_config().build(), Arc::new(MockFetcher::new()));
    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response.into_body()).await, "healthy");
}

//
// GET /sitemap.xml
//

#[tokio::test]
async fn test_sitemap_xml() {
    let app = test_router(base_config().urls(["/about", "/blog/"]).build(), Arc::new(MockFetcher::new()));
    let response = get(app, "/sitemap.xml").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/xml; charset=UTF-8");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=600, must-revalidate");

    let xml = body_text(response.into_body()).await;
    assert_eq!(
        element_texts(&xml, "loc"),
        vec!["https://site.com/", "https://site.com/blog", "https://site.com/about"]
    );
}

#[tokio::test]
async fn test_sitemap_xml_redirects_when_sharded() {
    let config = base_config().base_url("/docs/").sitemaps(ShardsConfig::Chunked).build();
    let response = get(test_router(config, Arc::new(MockFetcher::new())), "/sitemap.xml").await;

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()[header::LOCATION], "/docs/sitemap_index.xml");
}

#[tokio::test]
async fn test_disabled_and_missing_site_url() {
    let disabled = SitemapConfig::builder().site_url("https://site.com").enabled(false).build();
    let response = get(test_router(disabled, Arc::new(MockFetcher::new())), "/sitemap.xml").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(test_router(SitemapConfig::default(), Arc::new(MockFetcher::new())), "/sitemap.xml").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response.into_body()).await.contains("No site URL configured"));
}

#[tokio::test]
async fn test_payload_fetched_from_request_host() {
    let fetcher = Arc::new(MockFetcher::with_response("routes.json", r#"["/from-payload"]"#));
    let config = base_config().prerendered_routes_payload(true).build();
    let app = test_router(config, fetcher.clone());

    let request = Request::builder()
        .uri("/sitemap.xml")
        .header("x-forwarded-host", "internal.site.com")
        .header("x-forwarded-proto", "http")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(fetcher.requested(), vec!["http://internal.site.com/__sitemap__/routes.json"]);
    let xml = body_text(response.into_body()).await;
    assert!(xml.contains("<loc>https://site.com/from-payload</loc>"));
}

//
// Sharded sitemaps
//

#[tokio::test]
async fn test_index_and_chunks() {
    let urls: Vec<String> = (0..1500).map(|i| format!("/p/{i}")).collect();
    let config = base_config().sitemaps(ShardsConfig::Chunked).urls(urls).build();
    let app = test_router(config, Arc::new(MockFetcher::new()));

    let response = get(app.clone(), "/sitemap_index.xml").await;
    assert_eq!(response.status(), StatusCode::OK);
    let xml = body_text(response.into_body()).await;
    assert_eq!(
        element_texts(&xml, "loc"),
        vec!["https://site.com/0-sitemap.xml", "https://site.com/1-sitemap.xml"]
    );

    let response = get(app.clone(), "/1-sitemap.xml").await;
    assert_eq!(response.status(), StatusCode::OK);
    let xml = body_text(response.into_body()).await;
    assert_eq!(element_texts(&xml, "loc").len(), 501);

    assert_eq!(get(app.clone(), "/5-sitemap.xml").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(get(app, "/robots.txt").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_named_shards() {
    let shards = vec![
        NamedShard {
            name: "posts".to_string(),
            overrides: ShardOverrides {
                include: Some(vec!["/blog/**".into()]),
                ..ShardOverrides::default()
            },
        },
        NamedShard {
            name: "pages".to_string(),
            overrides: ShardOverrides {
                exclude: Some(vec!["/blog/**".into()]),
                ..ShardOverrides::default()
            },
        },
    ];
    let config = base_config()
        .urls(["/about", "/blog/a", "/blog/b"])
        .sitemaps(ShardsConfig::Named { shards, index: Vec::new() })
        .build();
    let app = test_router(config, Arc::new(MockFetcher::new()));

    let xml = body_text(get(app.clone(), "/posts-sitemap.xml").await.into_body()).await;
    assert_eq!(
        element_texts(&xml, "loc"),
        vec!["https://site.com/blog/a", "https://site.com/blog/b"]
    );

    let xml = body_text(get(app.clone(), "/pages-sitemap.xml").await.into_body()).await;
    assert_eq!(element_texts(&xml, "loc"), vec!["https://site.com/", "https://site.com/about"]);

    assert_eq!(get(app.clone(), "/sitemap_index.xml").await.status(), StatusCode::OK);
    assert_eq!(get(app, "/videos-sitemap.xml").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_index_not_found_when_unsharded() {
    let app = test_router(base_config().build(), Arc::new(MockFetcher::new()));
    assert_eq!(get(app, "/sitemap_index.xml").await.status(), StatusCode::NOT_FOUND);
}

//
// GET /__sitemap__/style.xsl
//

#[tokio::test]
async fn test_stylesheet() {
    let config = SitemapConfig::builder().site_url("https://site.com").build();
    let response = get(test_router(config, Arc::new(MockFetcher::new())), "/__sitemap__/style.xsl").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response.into_body()).await.contains("xsl:stylesheet"));

    let response = get(test_router(base_config().build(), Arc::new(MockFetcher::new())), "/__sitemap__/style.xsl").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

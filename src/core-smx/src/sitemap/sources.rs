//! Collecting raw URLs from pages, endpoints and config.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::errors::{Result, SitemapError};
use crate::routes::resolve_pages_routes;
use crate::sitemap::config::SitemapConfig;
use crate::sitemap::entry::{PartialEntry, RawUrlInput};
use crate::url_utils::{has_protocol, join_url, site_url_without_base};

pub const PRERENDERED_ROUTES_PATH: &str = "/__sitemap__/routes.json";
pub const DOCUMENT_DRIVEN_URLS_PATH: &str = "/api/__sitemap__/document-driven-urls";

/// Fetches the body of a URL.
#[async_trait]
pub trait UrlFetcher: Send + Sync {
    /// GETs `url` asking for JSON and returns the body text.
    async fn fetch_json_text(&self, url: &str) -> Result<String>;
}

/// [`UrlFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UrlFetcher for HttpFetcher {
    async fn fetch_json_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Raw URL lists from every source, in precedence order (later wins).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlSources {
    pub prerendered: Vec<RawUrlInput>,
    pub dynamic: Vec<RawUrlInput>,
    pub config: Vec<RawUrlInput>,
    pub pages: Vec<RawUrlInput>,
    pub content: Vec<RawUrlInput>,
    /// Route paths of ignored page files; these are excluded from the output.
    pub ignored_paths: Vec<String>,
}

impl UrlSources {
    /// All inputs, led by the site root.
    pub fn into_inputs(self) -> Vec<RawUrlInput> {
        let mut inputs = Vec::with_capacity(
            1 + self.prerendered.len() + self.dynamic.len() + self.config.len() + self.pages.len() + self.content.len(),
        );
        inputs.push(RawUrlInput::from("/"));
        inputs.extend(self.prerendered);
        inputs.extend(self.dynamic);
        inputs.extend(self.config);
        inputs.extend(self.pages);
        inputs.extend(self.content);
        inputs
    }

    pub fn len(&self) -> usize {
        self.prerendered.len() + self.dynamic.len() + self.config.len() + self.pages.len() + self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses a JSON array of strings and/or entry objects.
pub fn parse_url_list(body: &str) -> Result<Vec<RawUrlInput>> {
    Ok(serde_json::from_str(body)?)
}

fn looks_like_html(body: &str) -> bool {
    body.trim_start()
        .get(..15)
        .is_some_and(|head| head.eq_ignore_ascii_case("<!DOCTYPE html>"))
}

/// Absolute URL of an endpoint on the serving host.
pub fn endpoint_url(config: &SitemapConfig, endpoint: &str) -> String {
    if has_protocol(endpoint) {
        return endpoint.to_string();
    }
    let origin = match &config.host {
        Some(host) if !host.is_empty() => host.clone(),
        _ => site_url_without_base(&config.site_url, &config.base_url),
    };
    join_url(&origin, &[&config.base_url, endpoint])
}

async fn try_fetch_url_list(fetcher: &dyn UrlFetcher, url: &str) -> Result<Vec<RawUrlInput>> {
    let body = fetcher.fetch_json_text(url).await?;
    if looks_like_html(&body) {
        return Err(SitemapError::UnexpectedResponse {
            url: url.to_string(),
            reason: "received an HTML page instead of JSON".to_string(),
        });
    }
    parse_url_list(&body)
}

/// Fetches and parses one optional URL list. Failures are logged and yield
/// an empty list.
async fn fetch_url_list(fetcher: &dyn UrlFetcher, label: &str, url: &str) -> Vec<RawUrlInput> {
    match try_fetch_url_list(fetcher, url).await {
        Ok(urls) => {
            debug!("Fetched {} {} URLs from {}", urls.len(), label, url);
            urls
        }
        Err(e) => {
            warn!("Skipping {} URLs, fetching {} failed: {}", label, url, e);
            Vec::new()
        }
    }
}

fn modified_time(file: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(file).and_then(|m| m.modified());
    match modified {
        Ok(time) => Some(DateTime::<Utc>::from(time)),
        Err(e) => {
            warn!("Could not read modification time of {}: {}", file.display(), e);
            None
        }
    }
}

/// Static page routes as entries, stamped with file modification times when
/// `autoLastmod` is on.
pub async fn collect_page_urls(config: &SitemapConfig) -> Result<(Vec<RawUrlInput>, Vec<String>)> {
    if !config.infer_static_pages_as_routes || config.pages_dirs.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let scan = resolve_pages_routes(&config.pages_dirs, &config.extensions).await?;
    let urls = scan
        .routes
        .into_iter()
        .map(|page| {
            let mut entry = PartialEntry::new(page.path);
            if config.auto_lastmod {
                entry.fields.lastmod = modified_time(&page.file).map(Into::into);
            }
            RawUrlInput::Detailed(entry)
        })
        .collect();
    Ok((urls, scan.ignored_paths))
}

/// Gathers every enabled source for one generation run.
///
/// Route inference errors are fatal; remote sources degrade to empty lists.
pub async fn collect_sources(config: &SitemapConfig, fetcher: &dyn UrlFetcher) -> Result<UrlSources> {
    let prerendered = if config.has_prerendered_routes_payload {
        fetch_url_list(fetcher, "pre-rendered", &endpoint_url(config, PRERENDERED_ROUTES_PATH)).await
    } else {
        Vec::new()
    };

    let dynamic = if config.fetches_dynamic_urls() {
        fetch_url_list(fetcher, "dynamic", &endpoint_url(config, &config.dynamic_urls_api_endpoint)).await
    } else {
        Vec::new()
    };

    let (pages, ignored_paths) = collect_page_urls(config).await?;

    let content = if config.is_content_document_driven {
        fetch_url_list(fetcher, "content", &endpoint_url(config, DOCUMENT_DRIVEN_URLS_PATH)).await
    } else {
        Vec::new()
    };

    let sources = UrlSources {
        prerendered,
        dynamic,
        config: config.urls.clone(),
        pages,
        content,
        ignored_paths,
    };
    debug!("Collected {} raw URLs", sources.len());
    Ok(sources)
}

#[cfg(any(test, feature = "test-helpers"))]
pub mod mock {
    //! In-memory [`UrlFetcher`] for tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::UrlFetcher;
    use crate::errors::{Result, SitemapError};

    /// Returns canned bodies for URLs containing a configured key, and
    /// records every requested URL.
    #[derive(Debug, Default)]
    pub struct MockFetcher {
        responses: HashMap<String, String>,
        should_fail: bool,
        requested: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a mock that answers URLs containing `url_contains` with `body`
        pub fn with_response(url_contains: &str, body: &str) -> Self {
            let mut fetcher = Self::new();
            fetcher.add_response(url_contains, body);
            fetcher
        }

        /// Create a mock that fails every request
        pub fn with_failure() -> Self {
            Self {
                should_fail: true,
                ..Self::default()
            }
        }

        pub fn add_response(&mut self, url_contains: &str, body: &str) {
            self.responses.insert(url_contains.to_string(), body.to_string());
        }

        /// URLs requested so far, in order.
        pub fn requested(&self) -> Vec<String> {
            self.requested.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl UrlFetcher for MockFetcher {
        async fn fetch_json_text(&self, url: &str) -> Result<String> {
            if let Ok(mut requested) = self.requested.lock() {
                requested.push(url.to_string());
            }
            if self.should_fail {
                return Err(SitemapError::UnexpectedResponse {
                    url: url.to_string(),
                    reason: "mock fetcher configured to fail".to_string(),
                });
            }
            self.responses
                .iter()
                .find(|(key, _)| url.contains(key.as_str()))
                .map(|(_, body)| body.clone())
                .ok_or_else(|| SitemapError::UnexpectedResponse {
                    url: url.to_string(),
                    reason: "no mock response configured".to_string(),
                })
        }
    }
}

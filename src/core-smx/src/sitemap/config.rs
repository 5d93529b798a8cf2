//! Sitemap generation configuration.
//!
//! Loaded from a camelCase JSON file (`sitemap.json`), overridden from the
//! environment, or assembled with [`SitemapConfig::builder`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::common::env::{normalise_site_url, site_url_from_env, trailing_slash_from_env};
use crate::errors::{Result, SitemapError};
use crate::sitemap::entry::{EntryFields, RawUrlInput, SitemapIndexEntry};
use crate::sitemap::filter::FilterRule;
use crate::sitemap::rules::RouteRule;

pub const DEFAULT_DYNAMIC_URLS_ENDPOINT: &str = "/api/_sitemap-urls";
pub const DEFAULT_XSL: &str = "/__sitemap__/style.xsl";

/// Settings a named shard may replace on top of the base config.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShardOverrides {
    pub include: Option<Vec<FilterRule>>,
    pub exclude: Option<Vec<FilterRule>>,
    pub urls: Option<Vec<RawUrlInput>>,
    pub defaults: Option<EntryFields>,
    pub trailing_slash: Option<bool>,
    pub auto_lastmod: Option<bool>,
    pub infer_static_pages_as_routes: Option<bool>,
    pub has_api_routes_url: Option<bool>,
    pub dynamic_urls_api_endpoint: Option<String>,
    pub has_prerendered_routes_payload: Option<bool>,
    pub is_content_document_driven: Option<bool>,
    pub auto_alternative_lang_prefixes: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedShard {
    pub name: String,
    pub overrides: ShardOverrides,
}

/// How the URL set is split across files.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ShardsConfig {
    /// One `sitemap.xml`.
    #[default]
    Single,
    /// Numbered shards of at most 1000 URLs each (`"sitemaps": true`).
    Chunked,
    /// Named shards, each running the full pipeline with its own overrides.
    /// `index` holds extra literal entries for the sitemap index.
    Named {
        shards: Vec<NamedShard>,
        index: Vec<SitemapIndexEntry>,
    },
}

impl ShardsConfig {
    pub fn is_sharded(&self) -> bool {
        !matches!(self, ShardsConfig::Single)
    }
}

impl<'de> Deserialize<'de> for ShardsConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error;

        match Value::deserialize(deserializer)? {
            Value::Null | Value::Bool(false) => Ok(ShardsConfig::Single),
            Value::Bool(true) => Ok(ShardsConfig::Chunked),
            Value::Object(map) => {
                let mut shards = Vec::new();
                let mut index = Vec::new();
                for (name, value) in map {
                    if name == "index" {
                        index = serde_json::from_value(value).map_err(D::Error::custom)?;
                    } else {
                        let overrides = serde_json::from_value(value).map_err(D::Error::custom)?;
                        shards.push(NamedShard { name, overrides });
                    }
                }
                Ok(ShardsConfig::Named { shards, index })
            }
            other => Err(D::Error::custom(format!(
                "`sitemaps` must be a boolean or an object of named sitemaps, got {other}"
            ))),
        }
    }
}

/// `false` disables the stylesheet, `true` keeps the default one.
fn deserialize_xsl<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(path) if !path.is_empty() => Some(path),
        Value::Bool(true) => Some(DEFAULT_XSL.to_string()),
        _ => None,
    })
}

/// Configuration for one generation run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SitemapConfig {
    pub enabled: bool,
    /// Absolute site origin, optionally ending in the base path.
    #[serde(alias = "hostname")]
    pub site_url: String,
    /// Path the site is served under, e.g. `/` or `/docs/`.
    pub base_url: String,
    pub trailing_slash: bool,
    pub auto_lastmod: bool,
    pub infer_static_pages_as_routes: bool,
    pub discover_images: bool,
    pub has_api_routes_url: bool,
    pub dynamic_urls_api_endpoint: String,
    pub has_prerendered_routes_payload: bool,
    pub is_content_document_driven: bool,
    pub include: Vec<FilterRule>,
    pub exclude: Vec<FilterRule>,
    pub urls: Vec<RawUrlInput>,
    pub sitemaps: ShardsConfig,
    #[serde(deserialize_with = "deserialize_xsl")]
    pub xsl: Option<String>,
    /// Fields applied underneath every entry.
    pub defaults: EntryFields,
    pub auto_alternative_lang_prefixes: Vec<String>,
    pub pages_dirs: Vec<PathBuf>,
    pub extensions: Vec<String>,
    /// Origin of the server actually answering requests, used to fetch the
    /// pre-rendered routes payload. Falls back to `site_url`.
    pub host: Option<String>,
    pub route_rules: BTreeMap<String, RouteRule>,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            site_url: String::new(),
            base_url: "/".to_string(),
            trailing_slash: false,
            auto_lastmod: true,
            infer_static_pages_as_routes: true,
            discover_images: true,
            has_api_routes_url: false,
            dynamic_urls_api_endpoint: DEFAULT_DYNAMIC_URLS_ENDPOINT.to_string(),
            has_prerendered_routes_payload: false,
            is_content_document_driven: false,
            include: Vec::new(),
            exclude: Vec::new(),
            urls: Vec::new(),
            sitemaps: ShardsConfig::Single,
            xsl: Some(DEFAULT_XSL.to_string()),
            defaults: EntryFields::default(),
            auto_alternative_lang_prefixes: Vec::new(),
            pages_dirs: Vec::new(),
            extensions: vec![".vue".to_string()],
            host: None,
            route_rules: BTreeMap::new(),
        }
    }
}

impl SitemapConfig {
    /// Creates a new builder for SitemapConfig.
    pub fn builder() -> SitemapConfigBuilder {
        SitemapConfigBuilder::default()
    }

    /// Parses a JSON config and normalises the site URL.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: SitemapConfig = serde_json::from_str(json)?;
        config.site_url = normalise_site_url(&config.site_url);
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file, then applies environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let mut config = Self::from_json(&json)?;
        config.apply_env();
        tracing::debug!("Loaded sitemap config from {}", path.display());
        Ok(config)
    }

    /// `SITEMAP_SITE_URL` and `SITEMAP_TRAILING_SLASH` take precedence over file values.
    pub fn apply_env(&mut self) {
        if let Some(site_url) = site_url_from_env() {
            self.site_url = site_url;
        }
        if let Some(trailing_slash) = trailing_slash_from_env() {
            self.trailing_slash = trailing_slash;
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with('/') {
            return Err(SitemapError::InvalidConfig(format!(
                "baseUrl must start with '/', got \"{}\"",
                self.base_url
            )));
        }
        if let ShardsConfig::Named { shards, .. } = &self.sitemaps
            && let Some(shard) = shards.iter().find(|s| s.name.is_empty() || s.name.contains('/'))
        {
            return Err(SitemapError::InvalidConfig(format!(
                "invalid sitemap name \"{}\"",
                shard.name
            )));
        }
        Ok(())
    }

    /// The config a named shard runs with: every override set on the shard
    /// replaces the base value wholesale.
    pub fn with_overrides(&self, overrides: &ShardOverrides) -> SitemapConfig {
        let mut config = self.clone();
        let o = overrides.clone();
        if let Some(v) = o.include {
            config.include = v;
        }
        if let Some(v) = o.exclude {
            config.exclude = v;
        }
        if let Some(v) = o.urls {
            config.urls = v;
        }
        if let Some(v) = o.defaults {
            config.defaults = v;
        }
        if let Some(v) = o.trailing_slash {
            config.trailing_slash = v;
        }
        if let Some(v) = o.auto_lastmod {
            config.auto_lastmod = v;
        }
        if let Some(v) = o.infer_static_pages_as_routes {
            config.infer_static_pages_as_routes = v;
        }
        if let Some(v) = o.has_api_routes_url {
            config.has_api_routes_url = v;
        }
        if let Some(v) = o.dynamic_urls_api_endpoint {
            config.dynamic_urls_api_endpoint = v;
        }
        if let Some(v) = o.has_prerendered_routes_payload {
            config.has_prerendered_routes_payload = v;
        }
        if let Some(v) = o.is_content_document_driven {
            config.is_content_document_driven = v;
        }
        if let Some(v) = o.auto_alternative_lang_prefixes {
            config.auto_alternative_lang_prefixes = v;
        }
        config
    }

    /// Dynamic URLs are fetched when the flag is set or the endpoint was changed.
    pub fn fetches_dynamic_urls(&self) -> bool {
        self.has_api_routes_url || self.dynamic_urls_api_endpoint != DEFAULT_DYNAMIC_URLS_ENDPOINT
    }
}

/// Builder for SitemapConfig.
#[derive(Debug, Clone, Default)]
pub struct SitemapConfigBuilder {
    config: SitemapConfig,
}

impl SitemapConfigBuilder {
    /// Sets the site URL; `https://` is added when no scheme is given.
    pub fn site_url(mut self, site_url: &str) -> Self {
        self.config.site_url = normalise_site_url(site_url);
        self
    }

    pub fn base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn trailing_slash(mut self, trailing_slash: bool) -> Self {
        self.config.trailing_slash = trailing_slash;
        self
    }

    pub fn auto_lastmod(mut self, auto_lastmod: bool) -> Self {
        self.config.auto_lastmod = auto_lastmod;
        self
    }

    pub fn infer_static_pages_as_routes(mut self, infer: bool) -> Self {
        self.config.infer_static_pages_as_routes = infer;
        self
    }

    pub fn discover_images(mut self, discover: bool) -> Self {
        self.config.discover_images = discover;
        self
    }

    /// Enables fetching dynamic URLs from `endpoint`.
    pub fn dynamic_urls_api_endpoint(mut self, endpoint: &str) -> Self {
        self.config.has_api_routes_url = true;
        self.config.dynamic_urls_api_endpoint = endpoint.to_string();
        self
    }

    pub fn prerendered_routes_payload(mut self, enabled: bool) -> Self {
        self.config.has_prerendered_routes_payload = enabled;
        self
    }

    pub fn content_document_driven(mut self, enabled: bool) -> Self {
        self.config.is_content_document_driven = enabled;
        self
    }

    /// Adds a rule to include.
    pub fn include(mut self, rule: impl Into<FilterRule>) -> Self {
        self.config.include.push(rule.into());
        self
    }

    /// Adds a rule to exclude.
    pub fn exclude(mut self, rule: impl Into<FilterRule>) -> Self {
        self.config.exclude.push(rule.into());
        self
    }

    /// Adds a configured URL.
    pub fn url(mut self, url: impl Into<RawUrlInput>) -> Self {
        self.config.urls.push(url.into());
        self
    }

    /// Adds multiple configured URLs.
    pub fn urls<I, U>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<RawUrlInput>,
    {
        self.config.urls.extend(urls.into_iter().map(Into::into));
        self
    }

    pub fn sitemaps(mut self, sitemaps: ShardsConfig) -> Self {
        self.config.sitemaps = sitemaps;
        self
    }

    /// Sets the stylesheet href, or `None` to omit it.
    pub fn xsl(mut self, xsl: Option<&str>) -> Self {
        self.config.xsl = xsl.map(str::to_string);
        self
    }

    pub fn defaults(mut self, defaults: EntryFields) -> Self {
        self.config.defaults = defaults;
        self
    }

    pub fn auto_alternative_lang_prefixes(mut self, prefixes: &[&str]) -> Self {
        self.config.auto_alternative_lang_prefixes = prefixes.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Adds a pages directory to infer routes from.
    pub fn pages_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pages_dirs.push(dir.into());
        self
    }

    pub fn extensions(mut self, extensions: &[&str]) -> Self {
        self.config.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.config.host = Some(host.to_string());
        self
    }

    /// Adds a route rule for `pattern`.
    pub fn route_rule(mut self, pattern: &str, rule: RouteRule) -> Self {
        self.config.route_rules.insert(pattern.to_string(), rule);
        self
    }

    /// Builds the SitemapConfig.
    pub fn build(self) -> SitemapConfig {
        self.config
    }
}

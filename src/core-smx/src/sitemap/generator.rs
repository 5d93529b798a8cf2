//! The generation context: one object owning everything a run needs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::errors::Result;
use crate::sitemap::builder::{
    RenderStage, Shard, SitemapIndex, build_sitemap_index, chunk_entries, chunk_for_name, render_urlset,
};
use crate::sitemap::config::{DEFAULT_XSL, ShardsConfig, SitemapConfig};
use crate::sitemap::entry::{RawUrlInput, SitemapEntry};
use crate::sitemap::images::DiscoveredImages;
use crate::sitemap::pipeline::generate_entries;
use crate::sitemap::rules::RouteRuleTable;
use crate::sitemap::sources::{UrlFetcher, collect_sources};
use crate::sitemap::xsl::generate_xsl_stylesheet;

pub const SITEMAP_FILE: &str = "sitemap.xml";
pub const SITEMAP_INDEX_FILE: &str = "sitemap_index.xml";
pub const ROUTES_CACHE_FILE: &str = "__sitemap__/routes.json";

/// Result of [`SitemapGenerator::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Disabled,
    AlreadyGenerated,
    MissingSiteUrl,
    Written { files: Vec<PathBuf> },
}

/// File name of a shard.
pub fn shard_file_name(name: &str) -> String {
    format!("{name}-sitemap.xml")
}

/// Owns config, fetcher, route rules, discovered images and render stages
/// for sitemap generation.
pub struct SitemapGenerator {
    config: SitemapConfig,
    fetcher: Arc<dyn UrlFetcher>,
    rules: RouteRuleTable,
    images: DiscoveredImages,
    stages: Vec<Arc<dyn RenderStage>>,
    generated: bool,
}

impl std::fmt::Debug for SitemapGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SitemapGenerator")
            .field("config", &self.config)
            .field("rules", &self.rules.len())
            .field("stages", &self.stages.len())
            .field("generated", &self.generated)
            .finish()
    }
}

impl SitemapGenerator {
    /// Compiles the config's route rules; fails on an invalid pattern.
    pub fn new(config: SitemapConfig, fetcher: Arc<dyn UrlFetcher>) -> Result<Self> {
        let rules = RouteRuleTable::new(&config.route_rules, &config.base_url)?;
        if !rules.is_empty() {
            debug!("Compiled {} route rules", rules.len());
        }
        Ok(Self {
            config,
            fetcher,
            rules,
            images: DiscoveredImages::new(),
            stages: Vec::new(),
            generated: false,
        })
    }

    pub fn config(&self) -> &SitemapConfig {
        &self.config
    }

    /// Registers a stage run before every sitemap is serialized, after those
    /// already registered.
    pub fn with_render_stage(mut self, stage: impl RenderStage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn add_render_stage(&mut self, stage: Arc<dyn RenderStage>) {
        self.stages.push(stage);
    }

    /// Feeds a rendered page to image discovery. Returns how many images were found.
    pub fn record_rendered_page(&mut self, route: &str, html: &str) -> Result<usize> {
        if !self.config.discover_images || self.config.site_url.is_empty() || !html.contains("<img") {
            return Ok(0);
        }
        let found = self.images.record_page(route, html, &self.config.site_url)?;
        debug!("Discovered {} images on {}", found, route);
        Ok(found)
    }

    pub fn discovered_images(&self) -> &DiscoveredImages {
        &self.images
    }

    fn resolver(&self) -> RouteRuleTable {
        if self.images.is_empty() {
            return self.rules.clone();
        }
        self.rules.clone().with_images(self.images.to_map())
    }

    /// Collects every source and runs the merge pipeline under `config`.
    pub async fn entries(&self, config: &SitemapConfig, now: DateTime<Utc>) -> Result<Vec<SitemapEntry>> {
        let sources = collect_sources(config, self.fetcher.as_ref()).await?;
        generate_entries(sources, config, &self.resolver(), now)
    }

    /// Every shard with its URLs. Empty when sharding is off.
    pub async fn shards(&self, config: &SitemapConfig, now: DateTime<Utc>) -> Result<Vec<Shard>> {
        match &config.sitemaps {
            ShardsConfig::Single => Ok(Vec::new()),
            ShardsConfig::Chunked => Ok(chunk_entries(self.entries(config, now).await?)),
            ShardsConfig::Named { shards, .. } => {
                let mut resolved = Vec::with_capacity(shards.len());
                for shard in shards {
                    let shard_config = config.with_overrides(&shard.overrides);
                    resolved.push(Shard {
                        name: shard.name.clone(),
                        urls: self.entries(&shard_config, now).await?,
                    });
                }
                Ok(resolved)
            }
        }
    }

    /// The single `sitemap.xml` document.
    pub async fn sitemap_xml(&self, config: &SitemapConfig, now: DateTime<Utc>) -> Result<String> {
        let entries = self.entries(config, now).await?;
        Ok(render_urlset(entries, "sitemap", config, &self.stages))
    }

    /// The sitemap index together with the shards it points at.
    pub async fn sitemap_index(&self, config: &SitemapConfig, now: DateTime<Utc>) -> Result<(SitemapIndex, Vec<Shard>)> {
        let shards = self.shards(config, now).await?;
        Ok((build_sitemap_index(&shards, config, now), shards))
    }

    /// One shard's document, or `None` for an unknown shard name.
    pub async fn shard_xml(&self, config: &SitemapConfig, name: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        match &config.sitemaps {
            ShardsConfig::Single => Ok(None),
            ShardsConfig::Chunked => {
                let entries = self.entries(config, now).await?;
                let chunk = chunk_for_name(&entries, name);
                if chunk.is_empty() && name != "0" {
                    return Ok(None);
                }
                Ok(Some(render_urlset(chunk.to_vec(), name, config, &self.stages)))
            }
            ShardsConfig::Named { shards, .. } => {
                let Some(shard) = shards.iter().find(|s| s.name == name) else {
                    return Ok(None);
                };
                let shard_config = config.with_overrides(&shard.overrides);
                let entries = self.entries(&shard_config, now).await?;
                Ok(Some(render_urlset(entries, name, &shard_config, &self.stages)))
            }
        }
    }

    /// Writes the sitemap files into `out_dir`, at most once per generator.
    pub async fn generate(&mut self, out_dir: &Path) -> Result<Outcome> {
        if !self.config.enabled {
            info!("Sitemap generation is disabled.");
            return Ok(Outcome::Disabled);
        }
        if self.generated {
            debug!("Sitemap already generated, skipping");
            return Ok(Outcome::AlreadyGenerated);
        }
        self.generated = true;

        if self.config.site_url.is_empty() {
            error!("Please set a `siteUrl` in the sitemap config (or SITEMAP_SITE_URL) to generate a sitemap.");
            return Ok(Outcome::MissingSiteUrl);
        }

        tokio::fs::create_dir_all(out_dir).await?;
        let config = self.config.clone();
        let now = Utc::now();
        let mut files = Vec::new();
        let start = Instant::now();

        if config.sitemaps.is_sharded() {
            let (index, shards) = self.sitemap_index(&config, now).await?;
            files.push(write_file(out_dir, SITEMAP_INDEX_FILE, &index.xml, start).await?);

            for shard in shards {
                let shard_config = match &config.sitemaps {
                    ShardsConfig::Named { shards: named, .. } => named
                        .iter()
                        .find(|s| s.name == shard.name)
                        .map(|s| config.with_overrides(&s.overrides))
                        .unwrap_or_else(|| config.clone()),
                    _ => config.clone(),
                };
                let xml = render_urlset(shard.urls, &shard.name, &shard_config, &self.stages);
                files.push(write_file(out_dir, &shard_file_name(&shard.name), &xml, start).await?);
            }
        } else {
            let xml = self.sitemap_xml(&config, now).await?;
            files.push(write_file(out_dir, SITEMAP_FILE, &xml, start).await?);
        }

        if config.xsl.as_deref() == Some(DEFAULT_XSL) {
            files.push(write_file(out_dir, DEFAULT_XSL.trim_start_matches('/'), generate_xsl_stylesheet(), start).await?);
        }

        Ok(Outcome::Written { files })
    }
}

async fn write_file(out_dir: &Path, relative: &str, contents: &str, start: Instant) -> Result<PathBuf> {
    let path = out_dir.join(relative);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, contents).await?;
    info!("/{} ({}ms)", relative, start.elapsed().as_millis());
    Ok(path)
}

/// Raw routes for deferred serialization: pre-rendered routes that don't
/// look like files, then configured URLs, de-duplicated in order.
pub fn cached_routes(prerendered_routes: &[String], urls: &[RawUrlInput]) -> Vec<String> {
    let mut seen = HashSet::new();
    prerendered_routes
        .iter()
        .filter(|route| !route.contains('.'))
        .map(String::as_str)
        .chain(urls.iter().filter_map(RawUrlInput::location))
        .filter(|route| seen.insert(route.to_string()))
        .map(str::to_string)
        .collect()
}

/// Writes `__sitemap__/routes.json` under `out_dir`.
pub async fn write_routes_cache(out_dir: &Path, prerendered_routes: &[String], urls: &[RawUrlInput]) -> Result<PathBuf> {
    let routes = cached_routes(prerendered_routes, urls);
    let json = serde_json::to_string(&routes)?;
    write_file(out_dir, ROUTES_CACHE_FILE, &json, Instant::now()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sitemap::builder::RenderContext;
    use crate::sitemap::sources::mock::MockFetcher;

    fn generator(config: SitemapConfig) -> SitemapGenerator {
        SitemapGenerator::new(config, Arc::new(MockFetcher::new())).unwrap()
    }

    #[test]
    fn test_cached_routes() {
        let prerendered = vec!["/".to_string(), "/about".to_string(), "/feed.xml".to_string()];
        let urls = vec![RawUrlInput::from("/about"), RawUrlInput::from("/extra")];
        assert_eq!(cached_routes(&prerendered, &urls), vec!["/", "/about", "/extra"]);
    }

    #[tokio::test]
    async fn test_disabled_and_missing_site_url() {
        let dir = tempfile::tempdir().unwrap();

        let mut disabled = generator(SitemapConfig::builder().enabled(false).build());
        assert_eq!(disabled.generate(dir.path()).await.unwrap(), Outcome::Disabled);

        let mut missing = generator(SitemapConfig::default());
        assert_eq!(missing.generate(dir.path()).await.unwrap(), Outcome::MissingSiteUrl);
        assert_eq!(missing.generate(dir.path()).await.unwrap(), Outcome::AlreadyGenerated);
        assert!(!dir.path().join(SITEMAP_FILE).exists());
    }

    #[tokio::test]
    async fn test_generates_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut generator = generator(SitemapConfig::builder().site_url("https://site.com").url("/a").build());

        let Outcome::Written { files } = generator.generate(dir.path()).await.unwrap() else {
            panic!("expected files to be written");
        };
        assert_eq!(files, vec![dir.path().join("sitemap.xml"), dir.path().join("__sitemap__/style.xsl")]);
        assert_eq!(generator.generate(dir.path()).await.unwrap(), Outcome::AlreadyGenerated);

        let xml = std::fs::read_to_string(dir.path().join("sitemap.xml")).unwrap();
        assert!(xml.contains("<loc>https://site.com/a</loc>"));
    }

    #[tokio::test]
    async fn test_render_stages_run_in_order_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let config = SitemapConfig::builder()
            .site_url("https://site.com")
            .auto_lastmod(false)
            .xsl(None)
            .url("/a")
            .build();
        let mut generator = generator(config).with_render_stage(|ctx: &mut RenderContext| {
            ctx.urls.retain(|u| u.loc != "https://site.com/a");
        });
        generator.add_render_stage(Arc::new(|ctx: &mut RenderContext| {
            let loc = format!("https://site.com/from-{}", ctx.sitemap_name);
            ctx.urls.push(SitemapEntry::new(loc));
        }));

        assert!(matches!(generator.generate(dir.path()).await.unwrap(), Outcome::Written { .. }));
        let xml = std::fs::read_to_string(dir.path().join(SITEMAP_FILE)).unwrap();
        assert!(xml.contains("<loc>https://site.com/</loc>"));
        assert!(xml.contains("<loc>https://site.com/from-sitemap</loc>"));
        assert!(!xml.contains("<loc>https://site.com/a</loc>"));
    }

    #[tokio::test]
    async fn test_record_rendered_page_feeds_route_rules() {
        let mut generator = generator(
            SitemapConfig::builder()
                .site_url("https://site.com")
                .auto_lastmod(false)
                .url("/gallery")
                .build(),
        );
        let found = generator
            .record_rendered_page("/gallery", r#"<main><img src="/cat.jpg"></main>"#)
            .unwrap();
        assert_eq!(found, 1);

        let config = generator.config().clone();
        let entries = generator.entries(&config, Utc::now()).await.unwrap();
        let gallery = entries.iter().find(|e| e.loc == "https://site.com/gallery").unwrap();
        assert_eq!(gallery.fields.images[0].loc, "https://site.com/cat.jpg");
    }

    #[tokio::test]
    async fn test_shard_xml_for_unknown_names() {
        let generator = generator(
            SitemapConfig::builder()
                .site_url("https://site.com")
                .sitemaps(ShardsConfig::Chunked)
                .build(),
        );
        let config = generator.config().clone();
        assert!(generator.shard_xml(&config, "0", Utc::now()).await.unwrap().is_some());
        assert!(generator.shard_xml(&config, "7", Utc::now()).await.unwrap().is_none());
        assert!(generator.shard_xml(&config, "posts", Utc::now()).await.unwrap().is_none());
    }
}

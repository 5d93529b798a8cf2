//! Sitemap and sitemap index XML serialization.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::sitemap::config::{ShardsConfig, SitemapConfig};
use crate::sitemap::date::{format_date, normalise_date};
use crate::sitemap::entry::{Alternative, LastMod, SitemapEntry, SitemapIndexEntry};
use crate::url_utils::{has_protocol, looks_like_file, url_with_base, with_base, with_trailing_slash, without_trailing_slash};

/// Most URLs a numbered shard holds.
pub const MAX_SITEMAP_SIZE: usize = 1000;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const GENERATOR_COMMENT: &str = "<!-- XML Sitemap generated by smx -->";
const URLSET_OPEN: &str = concat!(
    r#"<urlset xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#,
    r#" xmlns:xhtml="http://www.w3.org/1999/xhtml""#,
    r#" xmlns:image="http://www.google.com/schemas/sitemap-image/1.1""#,
    r#" xmlns:video="http://www.google.com/schemas/sitemap-video/1.1""#,
    r#" xsi:schemaLocation="http://www.sitemaps.org/schemas/sitemap/0.9 http://www.sitemaps.org/schemas/sitemap/0.9/sitemap.xsd"#,
    r#" http://www.google.com/schemas/sitemap-image/1.1 http://www.google.com/schemas/sitemap-image/1.1/sitemap-image.xsd""#,
    r#" xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#,
);
const SITEMAPINDEX_OPEN: &str = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#;

const DATE_KEYS: [&str; 3] = ["lastmod", "publication_date", "expiration_date"];

/// The URL list about to be serialized, open to last-mile changes.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    pub urls: Vec<SitemapEntry>,
    /// `sitemap` for a single sitemap, otherwise the shard name.
    pub sitemap_name: String,
}

/// A step run on every sitemap right before it is serialized.
pub trait RenderStage: Send + Sync {
    fn apply(&self, ctx: &mut RenderContext);
}

impl<F> RenderStage for F
where
    F: Fn(&mut RenderContext) + Send + Sync,
{
    fn apply(&self, ctx: &mut RenderContext) {
        self(ctx)
    }
}

/// One shard of a sitemap index.
#[derive(Debug, Clone, PartialEq)]
pub struct Shard {
    pub name: String,
    pub urls: Vec<SitemapEntry>,
}

/// Rendered sitemap index and the entries it lists.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapIndex {
    pub entries: Vec<SitemapIndexEntry>,
    pub xml: String,
}

/// Escapes the five XML special characters.
pub fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Renders one field value as escaped element or attribute text.
///
/// `loc` and `href` are resolved against the site URL and base path unless
/// already absolute; the trailing-slash policy only applies to paths that do
/// not look like files. Date fields are normalised and booleans become
/// `yes`/`no`.
pub fn normalise_value(key: &str, value: &Value, config: &SitemapConfig) -> String {
    match value {
        Value::String(s) if key == "loc" || key == "href" => {
            if has_protocol(s) {
                return escape_xml(s);
            }
            let url = url_with_base(s, &config.base_url, &config.site_url);
            let url = if looks_like_file(&url) {
                url
            } else if config.trailing_slash {
                with_trailing_slash(&url)
            } else {
                without_trailing_slash(&url)
            };
            escape_xml(&url)
        }
        Value::String(s) if DATE_KEYS.contains(&key) => escape_xml(&normalise_date(s).unwrap_or_else(|| s.clone())),
        Value::String(s) => escape_xml(s),
        Value::Bool(true) => "yes".to_string(),
        Value::Bool(false) => "no".to_string(),
        Value::Null => String::new(),
        other => escape_xml(&other.to_string()),
    }
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

fn push_element(lines: &mut Vec<String>, indent: usize, name: &str, value: &Value, config: &SitemapConfig) {
    if !is_xml_name(name) {
        tracing::debug!("Skipping sitemap field with invalid element name \"{}\"", name);
        return;
    }
    let pad = " ".repeat(indent);
    match value {
        Value::Object(children) => {
            lines.push(format!("{pad}<{name}>"));
            for (child, child_value) in children {
                push_element(lines, indent + 4, child, child_value, config);
            }
            lines.push(format!("{pad}</{name}>"));
        }
        Value::Array(items) => {
            for item in items {
                push_element(lines, indent, name, item, config);
            }
        }
        scalar => lines.push(format!("{pad}<{name}>{}</{name}>", normalise_value(name, scalar, config))),
    }
}

/// Renders a typed child (`image:image`, `video:video`) from its serialized fields.
fn push_namespaced<T: Serialize>(lines: &mut Vec<String>, ns: &str, item: &T, config: &SitemapConfig) {
    let Ok(Value::Object(fields)) = serde_json::to_value(item) else {
        return;
    };
    lines.push(format!("        <{ns}:{ns}>"));
    for (key, value) in &fields {
        lines.push(format!(
            "            <{ns}:{key}>{}</{ns}:{key}>",
            normalise_value(key, value, config)
        ));
    }
    lines.push(format!("        </{ns}:{ns}>"));
}

fn push_alternative(lines: &mut Vec<String>, alternative: &Alternative, config: &SitemapConfig) {
    lines.push(format!(
        r#"        <xhtml:link rel="alternate" hreflang="{}" href="{}" />"#,
        escape_xml(&alternative.hreflang),
        normalise_value("href", &Value::String(alternative.href.clone()), config)
    ));
}

fn lastmod_value(lastmod: &LastMod) -> Value {
    match lastmod {
        LastMod::Timestamp(date) => Value::String(format_date(date)),
        LastMod::Text(text) => Value::String(text.clone()),
    }
}

/// Renders one `<url>` element.
pub fn render_entry(entry: &SitemapEntry, config: &SitemapConfig) -> String {
    let fields = &entry.fields;
    let mut lines = vec!["    <url>".to_string()];
    push_element(&mut lines, 8, "loc", &Value::String(entry.loc.clone()), config);
    if let Some(lastmod) = &fields.lastmod {
        push_element(&mut lines, 8, "lastmod", &lastmod_value(lastmod), config);
    }
    if let Some(changefreq) = fields.changefreq {
        push_element(&mut lines, 8, "changefreq", &Value::String(changefreq.to_string()), config);
    }
    if let Some(priority) = fields.priority {
        push_element(&mut lines, 8, "priority", &Value::from(priority), config);
    }
    for (key, value) in &fields.extra {
        push_element(&mut lines, 8, key, value, config);
    }
    for alternative in &fields.alternatives {
        push_alternative(&mut lines, alternative, config);
    }
    for image in &fields.images {
        push_namespaced(&mut lines, "image", image, config);
    }
    for video in &fields.videos {
        push_namespaced(&mut lines, "video", video, config);
    }
    lines.push("    </url>".to_string());
    lines.join("\n")
}

/// Stylesheet href with the base path applied, if a stylesheet is configured.
pub fn stylesheet_href(config: &SitemapConfig) -> Option<String> {
    config.xsl.as_deref().map(|xsl| with_base(xsl, &config.base_url))
}

/// Prepends the XML declaration (and stylesheet instruction) and appends the
/// generator comment.
pub fn wrap_sitemap_xml(body: Vec<String>, xsl: Option<&str>) -> String {
    let mut declaration = XML_DECLARATION.to_string();
    if let Some(xsl) = xsl {
        declaration.push_str(&format!(r#"<?xml-stylesheet type="text/xsl" href="{}"?>"#, escape_xml(xsl)));
    }
    let mut lines = Vec::with_capacity(body.len() + 2);
    lines.push(declaration);
    lines.extend(body);
    lines.push(GENERATOR_COMMENT.to_string());
    lines.join("\n")
}

/// Splits entries into numbered shards of at most [`MAX_SITEMAP_SIZE`].
pub fn chunk_entries(entries: Vec<SitemapEntry>) -> Vec<Shard> {
    let mut shards: Vec<Shard> = Vec::new();
    let mut entries = entries.into_iter().peekable();
    while entries.peek().is_some() {
        let urls: Vec<SitemapEntry> = entries.by_ref().take(MAX_SITEMAP_SIZE).collect();
        shards.push(Shard {
            name: shards.len().to_string(),
            urls,
        });
    }
    shards
}

/// The slice of `entries` a numbered shard covers. Unknown names give an empty slice.
pub fn chunk_for_name<'a>(entries: &'a [SitemapEntry], name: &str) -> &'a [SitemapEntry] {
    let Ok(index) = name.parse::<usize>() else {
        return &[];
    };
    let start = index.saturating_mul(MAX_SITEMAP_SIZE).min(entries.len());
    let end = start.saturating_add(MAX_SITEMAP_SIZE).min(entries.len());
    &entries[start..end]
}

/// Runs the render stages over `urls`, then serializes them as a `<urlset>`.
pub fn render_urlset(
    urls: Vec<SitemapEntry>,
    sitemap_name: &str,
    config: &SitemapConfig,
    stages: &[Arc<dyn RenderStage>],
) -> String {
    let mut ctx = RenderContext {
        urls,
        sitemap_name: sitemap_name.to_string(),
    };
    for stage in stages {
        stage.apply(&mut ctx);
    }

    let mut body = Vec::with_capacity(ctx.urls.len() + 2);
    body.push(URLSET_OPEN.to_string());
    body.extend(ctx.urls.iter().map(|entry| render_entry(entry, config)));
    body.push("</urlset>".to_string());
    wrap_sitemap_xml(body, stylesheet_href(config).as_deref())
}

/// Serializes a sitemap. With numbered shards, `sitemap_name` selects the
/// chunk of `entries` to render.
pub fn build_sitemap(
    entries: Vec<SitemapEntry>,
    sitemap_name: &str,
    config: &SitemapConfig,
    stages: &[Arc<dyn RenderStage>],
) -> String {
    let urls = match config.sitemaps {
        ShardsConfig::Chunked => chunk_for_name(&entries, sitemap_name).to_vec(),
        _ => entries,
    };
    render_urlset(urls, sitemap_name, config, stages)
}

/// Absolute URL of a shard file.
pub fn shard_url(name: &str, config: &SitemapConfig) -> String {
    url_with_base(&format!("{name}-sitemap.xml"), &config.base_url, &config.site_url)
}

fn shard_lastmod(shard: &Shard, config: &SitemapConfig, now: DateTime<Utc>) -> Option<LastMod> {
    let newest = shard
        .urls
        .iter()
        .filter_map(|url| url.fields.lastmod.as_ref().and_then(LastMod::to_datetime))
        .max();
    newest
        .or(config.auto_lastmod.then_some(now))
        .map(|date| LastMod::Text(format_date(&date)))
}

/// One index entry per shard, followed by any literal entries from config.
pub fn index_entries(shards: &[Shard], config: &SitemapConfig, now: DateTime<Utc>) -> Vec<SitemapIndexEntry> {
    let mut entries: Vec<SitemapIndexEntry> = shards
        .iter()
        .map(|shard| SitemapIndexEntry {
            sitemap: shard_url(&shard.name, config),
            lastmod: shard_lastmod(shard, config, now),
        })
        .collect();
    if let ShardsConfig::Named { index, .. } = &config.sitemaps {
        entries.extend(index.iter().cloned());
    }
    entries
}

/// Serializes a `<sitemapindex>`.
pub fn render_sitemap_index(entries: &[SitemapIndexEntry], config: &SitemapConfig) -> String {
    let mut body = Vec::with_capacity(entries.len() + 2);
    body.push(SITEMAPINDEX_OPEN.to_string());
    for entry in entries {
        let mut lines = vec![
            "    <sitemap>".to_string(),
            format!(
                "        <loc>{}</loc>",
                normalise_value("loc", &Value::String(entry.sitemap.clone()), config)
            ),
        ];
        if let Some(lastmod) = &entry.lastmod {
            lines.push(format!(
                "        <lastmod>{}</lastmod>",
                normalise_value("lastmod", &lastmod_value(lastmod), config)
            ));
        }
        lines.push("    </sitemap>".to_string());
        body.push(lines.join("\n"));
    }
    body.push("</sitemapindex>".to_string());
    wrap_sitemap_xml(body, stylesheet_href(config).as_deref())
}

/// Builds the sitemap index for already-resolved shards.
pub fn build_sitemap_index(shards: &[Shard], config: &SitemapConfig, now: DateTime<Utc>) -> SitemapIndex {
    let entries = index_entries(shards, config, now);
    let xml = render_sitemap_index(&entries, config);
    SitemapIndex { entries, xml }
}

//! Image discovery in rendered pages.

use std::collections::HashMap;

use scraper::{Html, Selector};
use url::Url;

use crate::errors::Result;
use crate::sitemap::entry::ImageEntry;
use crate::url_utils::without_trailing_slash;

/// Finds `<img src>` values inside the page's first `<main>` element, resolved
/// against `site_url`. Pages without a `<main>` yield nothing.
pub fn discover_images(html: &str, site_url: &str) -> Result<Vec<ImageEntry>> {
    let base = Url::parse(site_url)?;
    let document = Html::parse_document(html);

    let (Ok(main_selector), Ok(img_selector)) = (Selector::parse("main"), Selector::parse("img[src]")) else {
        return Ok(Vec::new());
    };
    let Some(main) = document.select(&main_selector).next() else {
        return Ok(Vec::new());
    };

    let mut images: Vec<ImageEntry> = Vec::new();
    for src in main.select(&img_selector).filter_map(|img| img.value().attr("src")) {
        let Ok(resolved) = base.join(src.trim()) else {
            tracing::debug!("Ignoring unresolvable image src \"{}\"", src);
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        if !images.iter().any(|i| i.loc == resolved.as_str()) {
            images.push(ImageEntry::new(resolved.as_str()));
        }
    }
    Ok(images)
}

/// Images found per route while pages were rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveredImages {
    by_route: HashMap<String, Vec<ImageEntry>>,
}

impl DiscoveredImages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans a rendered page and records its images under `route`.
    pub fn record_page(&mut self, route: &str, html: &str, site_url: &str) -> Result<usize> {
        let images = discover_images(html, site_url)?;
        let found = images.len();
        if found > 0 {
            self.by_route
                .entry(without_trailing_slash(route))
                .or_default()
                .extend(images);
        }
        Ok(found)
    }

    pub fn get(&self, route: &str) -> Option<&[ImageEntry]> {
        self.by_route.get(&without_trailing_slash(route)).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.by_route.is_empty()
    }

    pub fn to_map(&self) -> HashMap<String, Vec<ImageEntry>> {
        self.by_route.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const PAGE: &str = indoc! {r#"
        <!DOCTYPE html>
        <html>
        <body>
            <header><img src="/logo.png"></header>
            <main class="content">
                <img src="/images/hero.jpg" alt="Hero">
                <p><img src="https://cdn.example.com/photo.webp"></p>
                <img src="relative.png">
                <img src="/images/hero.jpg">
                <img alt="no source">
                <img src="data:image/png;base64,AAAA">
            </main>
        </body>
        </html>
    "#};

    #[test]
    fn test_discovers_images_in_main_only() {
        let images = discover_images(PAGE, "https://example.com/blog/").unwrap();
        let locs: Vec<&str> = images.iter().map(|i| i.loc.as_str()).collect();
        assert_eq!(
            locs,
            vec![
                "https://example.com/images/hero.jpg",
                "https://cdn.example.com/photo.webp",
                "https://example.com/blog/relative.png",
            ]
        );
    }

    #[test]
    fn test_no_main_element() {
        let images = discover_images("<html><body><img src=\"/a.png\"></body></html>", "https://example.com").unwrap();
        assert!(images.is_empty());
    }

    #[test]
    fn test_invalid_site_url() {
        assert!(discover_images(PAGE, "not a url").is_err());
    }

    #[test]
    fn test_record_page_keys_by_route() {
        let mut discovered = DiscoveredImages::new();
        assert_eq!(discovered.record_page("/about/", PAGE, "https://example.com").unwrap(), 3);
        assert_eq!(discovered.record_page("/empty", "<main></main>", "https://example.com").unwrap(), 0);
        assert_eq!(discovered.get("/about").map(<[ImageEntry]>::len), Some(3));
        assert!(discovered.get("/empty").is_none());
    }
}

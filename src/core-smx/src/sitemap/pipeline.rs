//! The URL merge pipeline: raw inputs in, normalised sitemap entries out.
//!
//! Stages, in order:
//! 1. coerce inputs to entries with the configured defaults underneath
//! 2. normalise `loc` (encoding, trailing slash, base path)
//! 3. merge entries sharing a `loc`
//! 4. include/exclude filtering
//! 5. stable sort by `loc` length
//! 6. `lastmod` normalisation
//! 7. alternate-language links
//! 8. route rules
//! 9. absolute `loc` under the site URL
//! 10. merge again, the later pipeline stage winning

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::sitemap::config::SitemapConfig;
use crate::sitemap::entry::{Alternative, EntryFields, LastMod, PartialEntry, SitemapEntry, merge_on_loc};
use crate::sitemap::filter::{FilterRule, create_filter};
use crate::sitemap::rules::RouteRuleResolver;
use crate::sitemap::sources::UrlSources;
use crate::url_utils::{
    encode_uri, has_protocol, join_url, looks_like_file, site_url_without_base, with_base, with_trailing_slash,
    without_base, without_trailing_slash,
};

/// Encodes a location, applies the trailing-slash policy and prefixes the base path.
///
/// The policy is applied again after prefixing: the root joined onto a base
/// path loses its slash.
pub fn fix_loc(url: &str, config: &SitemapConfig) -> String {
    if looks_like_file(url) {
        return with_base(&encode_uri(url), &config.base_url);
    }
    let slash_policy = |url: &str| {
        if config.trailing_slash {
            with_trailing_slash(url)
        } else {
            without_trailing_slash(url)
        }
    };
    slash_policy(&with_base(&encode_uri(&slash_policy(url)), &config.base_url))
}

/// Resolves a root-relative `loc` against the site origin.
fn absolute_loc(loc: &str, origin: &str) -> String {
    if has_protocol(loc) || origin.is_empty() {
        return loc.to_string();
    }
    let joined = join_url(origin, &[loc]);
    if loc.ends_with('/') {
        with_trailing_slash(&joined)
    } else {
        joined
    }
}

fn normalise_lastmod(fields: &mut EntryFields) {
    fields.lastmod = fields.lastmod.take().and_then(|l| l.normalised()).map(LastMod::Text);
}

fn has_lang_prefix(loc: &str, prefix_path: &str) -> bool {
    loc.strip_prefix(prefix_path)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Runs every pipeline stage over the collected sources.
///
/// `now` is stamped as `lastmod` underneath every entry when `autoLastmod`
/// is on; passing the same value makes repeated runs byte-identical.
pub fn generate_entries(
    sources: UrlSources,
    config: &SitemapConfig,
    resolver: &dyn RouteRuleResolver,
    now: DateTime<Utc>,
) -> Result<Vec<SitemapEntry>> {
    let mut exclude: Vec<FilterRule> = config.exclude.iter().map(|r| r.with_base(&config.base_url)).collect();
    exclude.extend(
        sources
            .ignored_paths
            .iter()
            .map(|p| FilterRule::Path(with_base(p, &config.base_url))),
    );
    let include: Vec<FilterRule> = config.include.iter().map(|r| r.with_base(&config.base_url)).collect();
    let filter = create_filter(&include, &exclude)?;

    let mut defaults = PartialEntry {
        fields: config.defaults.clone(),
        ..Default::default()
    };
    if config.auto_lastmod && defaults.fields.lastmod.is_none() {
        defaults.fields.lastmod = Some(LastMod::Timestamp(now));
    }

    let inputs = sources.into_inputs();
    let input_count = inputs.len();
    let coerced: Vec<SitemapEntry> = inputs
        .into_iter()
        .filter_map(|input| {
            let partial = input.into_partial().overlay(defaults.clone());
            let Some(location) = partial.location() else {
                warn!("Dropping sitemap URL without `loc` or `url`: {:?}", partial.fields);
                return None;
            };
            Some(SitemapEntry {
                loc: fix_loc(location, config),
                fields: partial.fields,
            })
        })
        .collect();

    let mut entries: Vec<SitemapEntry> = merge_on_loc(coerced)
        .into_iter()
        .filter(|e| filter.allows(&e.loc))
        .collect();
    entries.sort_by_key(|e| e.loc.len());
    debug!("{} of {} URLs remain after merging and filtering", entries.len(), input_count);

    let prefixes = &config.auto_alternative_lang_prefixes;
    let prefix_paths: Vec<String> = prefixes
        .iter()
        .map(|p| with_base(&format!("/{p}"), &config.base_url))
        .collect();

    let origin = site_url_without_base(&config.site_url, &config.base_url);
    let mut finalised = Vec::with_capacity(entries.len());
    for mut entry in entries {
        normalise_lastmod(&mut entry.fields);

        if !prefixes.is_empty() {
            if prefix_paths.iter().any(|p| has_lang_prefix(&entry.loc, p)) {
                continue;
            }
            let path = without_base(&entry.loc, &config.base_url);
            let generated = EntryFields {
                alternatives: prefixes
                    .iter()
                    .map(|prefix| Alternative {
                        hreflang: prefix.clone(),
                        href: fix_loc(&join_url(&format!("/{prefix}"), &[&path]), config),
                    })
                    .collect(),
                ..Default::default()
            };
            entry.fields = entry.fields.overlay(generated);
        }

        let rule = resolver.rules_for_path(&without_trailing_slash(&entry.loc));
        if rule.index == Some(false) {
            continue;
        }
        if let Some(sitemap) = rule.sitemap {
            entry.fields = entry.fields.overlay(sitemap);
            normalise_lastmod(&mut entry.fields);
        }

        entry.loc = absolute_loc(&entry.loc, &origin);
        finalised.push(entry);
    }

    let merged = merge_on_loc(finalised);
    debug!("Generated {} sitemap entries", merged.len());
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sitemap::entry::{ChangeFreq, RawUrlInput};
    use crate::sitemap::rules::{NoRouteRules, RouteRule, RouteRuleTable};
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn config() -> SitemapConfig {
        SitemapConfig::builder()
            .site_url("https://site.com")
            .auto_lastmod(false)
            .build()
    }

    fn inputs(value: serde_json::Value) -> Vec<RawUrlInput> {
        serde_json::from_value(value).unwrap()
    }

    fn run(config: &SitemapConfig, urls: serde_json::Value) -> Vec<SitemapEntry> {
        let sources = UrlSources {
            config: inputs(urls),
            ..Default::default()
        };
        generate_entries(sources, config, &NoRouteRules, now()).unwrap()
    }

    fn locs(entries: &[SitemapEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.loc.as_str()).collect()
    }

    #[test]
    fn test_merges_entries_sharing_a_loc() {
        let entries = run(
            &config(),
            json!([{"loc": "/a", "priority": 0.5}, {"loc": "/a", "lastmod": "2024-01-01"}]),
        );
        assert_eq!(locs(&entries), vec!["https://site.com/", "https://site.com/a"]);
        let a = &entries[1];
        assert_eq!(a.fields.priority, Some(0.5));
        assert_eq!(a.fields.lastmod, Some(LastMod::Text("2024-01-01T00:00:00+00:00".into())));
    }

    #[test]
    fn test_sorted_by_loc_length_and_stable() {
        let entries = run(&config(), json!(["/long/path/here", "/bb", "/aa", "/c"]));
        assert_eq!(
            locs(&entries),
            vec![
                "https://site.com/",
                "https://site.com/c",
                "https://site.com/bb",
                "https://site.com/aa",
                "https://site.com/long/path/here"
            ]
        );
    }

    #[test]
    fn test_trailing_slash_policy_skips_files() {
        let config = SitemapConfig {
            trailing_slash: true,
            ..config()
        };
        let entries = run(&config, json!(["/about", "/feed.xml"]));
        assert_eq!(
            locs(&entries),
            vec!["https://site.com/", "https://site.com/about/", "https://site.com/feed.xml"]
        );

        let entries = run(&self::config(), json!(["/about/"]));
        assert_eq!(locs(&entries)[1], "https://site.com/about");
    }

    #[test]
    fn test_trailing_slash_policy_under_base_url() {
        let config = SitemapConfig::builder()
            .site_url("https://site.com")
            .base_url("/docs/")
            .trailing_slash(true)
            .auto_lastmod(false)
            .build();
        let entries = run(&config, json!(["/guide", "/feed.xml"]));
        assert_eq!(
            locs(&entries),
            vec![
                "https://site.com/docs/",
                "https://site.com/docs/guide/",
                "https://site.com/docs/feed.xml",
            ]
        );
        assert_eq!(fix_loc("/", &config), "/docs/");
    }

    #[test]
    fn test_base_url_and_encoding() {
        let config = SitemapConfig::builder()
            .site_url("https://site.com/docs/")
            .base_url("/docs/")
            .auto_lastmod(false)
            .build();
        let entries = run(&config, json!(["/guide", "/docs/api", "/hello world", "https://cdn.site.com/x"]));
        assert_eq!(
            locs(&entries),
            vec![
                "https://site.com/docs",
                "https://site.com/docs/api",
                "https://site.com/docs/guide",
                "https://site.com/docs/hello%20world",
                "https://cdn.site.com/x",
            ]
        );
    }

    #[test]
    fn test_url_alias_and_missing_location() {
        let entries = run(&config(), json!([{"url": "/via-url"}, {"priority": 0.1}]));
        assert_eq!(locs(&entries), vec!["https://site.com/", "https://site.com/via-url"]);
    }

    #[test]
    fn test_filters_use_base_and_ignored_pages() {
        let config = SitemapConfig::builder()
            .site_url("https://site.com")
            .auto_lastmod(false)
            .exclude("/private/**")
            .build();
        let sources = UrlSources {
            config: inputs(json!(["/private/a", "/public", "/drafts"])),
            ignored_paths: vec!["/drafts".to_string()],
            ..Default::default()
        };
        let entries = generate_entries(sources, &config, &NoRouteRules, now()).unwrap();
        assert_eq!(locs(&entries), vec!["https://site.com/", "https://site.com/public"]);
    }

    #[test]
    fn test_defaults_and_auto_lastmod() {
        let config = SitemapConfig {
            auto_lastmod: true,
            defaults: serde_json::from_value(json!({"changefreq": "weekly"})).unwrap(),
            ..config()
        };
        let entries = run(&config, json!([{"loc": "/a", "changefreq": "daily"}, {"loc": "/b", "lastmod": "not a date"}]));
        assert_eq!(entries[1].fields.changefreq, Some(ChangeFreq::Daily));
        assert_eq!(entries[0].fields.changefreq, Some(ChangeFreq::Weekly));
        assert_eq!(entries[0].fields.lastmod, Some(LastMod::Text("2024-06-01T12:00:00+00:00".into())));
        assert_eq!(entries[2].fields.lastmod, None, "invalid dates are dropped");
    }

    #[test]
    fn test_language_alternatives() {
        let config = SitemapConfig::builder()
            .site_url("https://site.com")
            .auto_lastmod(false)
            .auto_alternative_lang_prefixes(&["fr", "de"])
            .build();
        let entries = run(&config, json!(["/about", "/fr/about", "/french-toast"]));
        assert_eq!(
            locs(&entries),
            vec!["https://site.com/", "https://site.com/about", "https://site.com/french-toast"]
        );
        let about = &entries[1];
        assert_eq!(
            about.fields.alternatives,
            vec![
                Alternative {
                    hreflang: "fr".into(),
                    href: "/fr/about".into()
                },
                Alternative {
                    hreflang: "de".into(),
                    href: "/de/about".into()
                },
            ]
        );
        assert_eq!(entries[0].fields.alternatives[0].href, "/fr");
    }

    #[test]
    fn test_route_rules() {
        let mut rules = std::collections::BTreeMap::new();
        rules.insert("/admin/**".to_string(), RouteRule::excluded());
        rules.insert(
            "/blog/**".to_string(),
            RouteRule::with_sitemap(serde_json::from_value(json!({"priority": 0.1, "changefreq": "daily"})).unwrap()),
        );
        let table = RouteRuleTable::new(&rules, "/").unwrap();
        let sources = UrlSources {
            config: inputs(json!(["/admin/users", {"loc": "/blog/post", "priority": 0.9}])),
            ..Default::default()
        };

        let entries = generate_entries(sources, &config(), &table, now()).unwrap();
        assert_eq!(locs(&entries), vec!["https://site.com/", "https://site.com/blog/post"]);
        assert_eq!(entries[1].fields.priority, Some(0.9), "entry fields beat rule fields");
        assert_eq!(entries[1].fields.changefreq, Some(ChangeFreq::Daily));
    }

    #[test]
    fn test_idempotent() {
        let config = SitemapConfig {
            auto_lastmod: true,
            auto_alternative_lang_prefixes: vec!["fr".into()],
            ..config()
        };
        let urls = json!(["/z", {"loc": "/a", "images": [{"loc": "/a.png"}]}, "/m/n", "/a"]);
        let first = run(&config, urls.clone());
        let second = run(&config, urls);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

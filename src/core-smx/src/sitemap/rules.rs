//! Per-path route rules: sitemap exclusion and field overrides.

use std::collections::{BTreeMap, HashMap};

use globset::{GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::sitemap::entry::{EntryFields, ImageEntry};
use crate::sitemap::filter::route_pattern_globs;
use crate::url_utils::{without_base, without_trailing_slash};

/// Rule attached to a route pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteRule {
    /// `Some(false)` removes matching paths from the sitemap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<bool>,
    /// Fields merged underneath matching entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sitemap: Option<EntryFields>,
}

impl RouteRule {
    pub fn excluded() -> Self {
        Self {
            index: Some(false),
            sitemap: None,
        }
    }

    pub fn with_sitemap(sitemap: EntryFields) -> Self {
        Self {
            index: None,
            sitemap: Some(sitemap),
        }
    }

    /// Merges `base` underneath `self`.
    pub fn overlay(self, base: RouteRule) -> RouteRule {
        RouteRule {
            index: self.index.or(base.index),
            sitemap: match (self.sitemap, base.sitemap) {
                (Some(winner), Some(base)) => Some(winner.overlay(base)),
                (winner, base) => winner.or(base),
            },
        }
    }
}

/// Looks up the merged route rule for a path.
pub trait RouteRuleResolver: Send + Sync {
    fn rules_for_path(&self, path: &str) -> RouteRule;
}

impl<F> RouteRuleResolver for F
where
    F: Fn(&str) -> RouteRule + Send + Sync,
{
    fn rules_for_path(&self, path: &str) -> RouteRule {
        self(path)
    }
}

/// A resolver that never matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRouteRules;

impl RouteRuleResolver for NoRouteRules {
    fn rules_for_path(&self, _path: &str) -> RouteRule {
        RouteRule::default()
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    pattern: String,
    matcher: GlobSet,
    rule: RouteRule,
}

/// Route rules compiled from config, plus images discovered per route.
///
/// Every matching rule applies; where they disagree the longest pattern
/// wins. Discovered images sit underneath all configured rules.
#[derive(Debug, Clone, Default)]
pub struct RouteRuleTable {
    base_url: String,
    rules: Vec<CompiledRule>,
    images: HashMap<String, Vec<ImageEntry>>,
}

impl RouteRuleTable {
    pub fn new(rules: &BTreeMap<String, RouteRule>, base_url: &str) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for (pattern, rule) in rules {
            let mut builder = GlobSetBuilder::new();
            for glob in route_pattern_globs(pattern)? {
                builder.add(glob);
            }
            compiled.push(CompiledRule {
                pattern: pattern.clone(),
                matcher: builder.build()?,
                rule: rule.clone(),
            });
        }
        compiled.sort_by(|a, b| b.pattern.len().cmp(&a.pattern.len()));
        Ok(Self {
            base_url: base_url.to_string(),
            rules: compiled,
            images: HashMap::new(),
        })
    }

    /// Replaces the discovered images, keyed by route path.
    pub fn with_images(mut self, images: HashMap<String, Vec<ImageEntry>>) -> Self {
        self.images = images;
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl RouteRuleResolver for RouteRuleTable {
    fn rules_for_path(&self, path: &str) -> RouteRule {
        let route = without_base(&without_trailing_slash(path), &self.base_url);

        let mut merged = self
            .rules
            .iter()
            .filter(|compiled| compiled.matcher.is_match(&route))
            .fold(RouteRule::default(), |acc, compiled| acc.overlay(compiled.rule.clone()));

        if let Some(images) = self.images.get(&route) {
            let discovered = EntryFields {
                images: images.clone(),
                ..Default::default()
            };
            merged = merged.overlay(RouteRule::with_sitemap(discovered));
        }
        merged
    }
}

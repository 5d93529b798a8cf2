//! Include/exclude filtering of sitemap paths.
//!
//! String rules use route syntax: `:param` and `*` match one path segment,
//! `**` matches any number of them. Rules given as `{ "regex": "..." }` are
//! regular expressions tested against the whole path.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::url_utils::{with_base, without_trailing_slash};

/// One include or exclude rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterRule {
    Path(String),
    Regex { regex: String },
}

impl FilterRule {
    /// Prefixes path rules with the site's base path; regex rules are left alone.
    pub fn with_base(&self, base: &str) -> FilterRule {
        match self {
            FilterRule::Path(path) => FilterRule::Path(with_base(path, base)),
            FilterRule::Regex { regex } => FilterRule::Regex { regex: regex.clone() },
        }
    }
}

impl From<&str> for FilterRule {
    fn from(path: &str) -> Self {
        FilterRule::Path(path.to_string())
    }
}

impl From<String> for FilterRule {
    fn from(path: String) -> Self {
        FilterRule::Path(path)
    }
}

fn glob(pattern: &str) -> Result<Glob> {
    Ok(GlobBuilder::new(pattern).literal_separator(true).build()?)
}

fn escape_segment(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '?' | '[' | ']' | '{' | '}' | '\\' => {
                escaped.push('[');
                escaped.push(c);
                escaped.push(']');
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Compiles one route pattern into the globs that together match it.
///
/// A pattern ending in `/**` also matches its bare prefix, so `/blog/**`
/// covers `/blog` as well as everything below it.
pub(crate) fn route_pattern_globs(pattern: &str) -> Result<Vec<Glob>> {
    let pattern = without_trailing_slash(pattern);
    let translated = pattern
        .split('/')
        .map(|segment| match segment {
            "**" | "*" => segment.to_string(),
            s if s.starts_with(':') => "*".to_string(),
            s => escape_segment(s),
        })
        .collect::<Vec<_>>()
        .join("/");

    let mut globs = vec![glob(&translated)?];
    if let Some(prefix) = translated.strip_suffix("/**") {
        globs.push(glob(if prefix.is_empty() { "/" } else { prefix })?);
    }
    Ok(globs)
}

/// One compiled rule set: either includes or excludes.
#[derive(Debug, Clone, Default)]
struct RuleSet {
    regexes: Vec<Regex>,
    literals: Vec<String>,
    routes: Option<GlobSet>,
}

impl RuleSet {
    fn compile(rules: &[FilterRule]) -> Result<Self> {
        let mut regexes = Vec::new();
        let mut literals = Vec::new();
        let mut builder = GlobSetBuilder::new();
        for rule in rules {
            match rule {
                FilterRule::Regex { regex } => regexes.push(Regex::new(regex)?),
                FilterRule::Path(path) => {
                    for glob in route_pattern_globs(path)? {
                        builder.add(glob);
                    }
                    literals.push(path.clone());
                }
            }
        }
        let routes = if literals.is_empty() { None } else { Some(builder.build()?) };
        Ok(Self {
            regexes,
            literals,
            routes,
        })
    }

    fn is_empty(&self) -> bool {
        self.regexes.is_empty() && self.literals.is_empty()
    }

    /// Regexes first, then exact string equality, then route patterns.
    fn matches(&self, path: &str) -> bool {
        if self.regexes.iter().any(|r| r.is_match(path)) {
            return true;
        }
        if self.literals.iter().any(|l| l == path) {
            return true;
        }
        self.routes
            .as_ref()
            .is_some_and(|routes| routes.is_match(without_trailing_slash(path)))
    }
}

/// A compiled include/exclude filter over sitemap paths.
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    include: RuleSet,
    exclude: RuleSet,
}

impl UrlFilter {
    /// True if `path` belongs in the sitemap.
    ///
    /// Excludes are checked before includes. When neither matches, the path is
    /// kept only if no include rules were configured.
    pub fn allows(&self, path: &str) -> bool {
        if !self.exclude.is_empty() && self.exclude.matches(path) {
            return false;
        }
        if !self.include.is_empty() && self.include.matches(path) {
            return true;
        }
        self.include.is_empty()
    }
}

/// Compiles include and exclude rules into a [`UrlFilter`].
///
/// ```
/// # use core_smx::sitemap::filter::{create_filter, FilterRule};
/// let filter = create_filter(&[], &[FilterRule::from("/private/**")]).unwrap();
/// assert!(!filter.allows("/private/x"));
/// assert!(filter.allows("/about"));
/// ```
pub fn create_filter(include: &[FilterRule], exclude: &[FilterRule]) -> Result<UrlFilter> {
    Ok(UrlFilter {
        include: RuleSet::compile(include)?,
        exclude: RuleSet::compile(exclude)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(paths: &[&str]) -> Vec<FilterRule> {
        paths.iter().map(|p| FilterRule::from(*p)).collect()
    }

    #[test]
    fn test_empty_filter_allows_everything() {
        let filter = create_filter(&[], &[]).unwrap();
        assert!(filter.allows("/anything"));
        assert!(filter.allows("/"));
    }

    #[test]
    fn test_exclude_double_star() {
        let filter = create_filter(&[], &rules(&["/private/**"])).unwrap();
        assert!(!filter.allows("/private/x"));
        assert!(!filter.allows("/private/x/y"));
        assert!(!filter.allows("/private"));
        assert!(filter.allows("/privateer"));
        assert!(filter.allows("/public"));
    }

    #[test]
    fn test_include_makes_default_exclusion() {
        let filter = create_filter(&rules(&["/blog/**"]), &[]).unwrap();
        assert!(!filter.allows("/about"));
        assert!(filter.allows("/blog/post-1"));
    }

    #[test]
    fn test_single_star_and_params_match_one_segment() {
        let filter = create_filter(&rules(&["/blog/*", "/users/:id"]), &[]).unwrap();
        assert!(filter.allows("/blog/post-1"));
        assert!(!filter.allows("/blog/2024/post-1"));
        assert!(filter.allows("/users/42"));
        assert!(filter.allows("/users/42/"));
        assert!(!filter.allows("/users/42/edit"));
    }

    #[test]
    fn test_exclude_beats_include() {
        let filter = create_filter(&rules(&["/blog/**"]), &rules(&["/blog/drafts/**"])).unwrap();
        assert!(filter.allows("/blog/post"));
        assert!(!filter.allows("/blog/drafts/wip"));
    }

    #[test]
    fn test_regex_rules() {
        let exclude = vec![FilterRule::Regex {
            regex: r"^/blog/\d+$".to_string(),
        }];
        let filter = create_filter(&[], &exclude).unwrap();
        assert!(!filter.allows("/blog/123"));
        assert!(filter.allows("/blog/abc"));
    }

    #[test]
    fn test_glob_characters_in_literals_are_escaped() {
        let filter = create_filter(&[], &rules(&["/what?"])).unwrap();
        assert!(!filter.allows("/what?"));
        assert!(filter.allows("/whatx"));
    }

    #[test]
    fn test_rules_deserialise_untagged() {
        let parsed: Vec<FilterRule> = serde_json::from_str(r#"["/a/**", {"regex": "^/b"}]"#).unwrap();
        assert_eq!(parsed[0], FilterRule::Path("/a/**".into()));
        assert_eq!(parsed[1], FilterRule::Regex { regex: "^/b".into() });
    }

    #[test]
    fn test_with_base() {
        assert_eq!(FilterRule::from("/a").with_base("/docs/"), FilterRule::Path("/docs/a".into()));
    }
}

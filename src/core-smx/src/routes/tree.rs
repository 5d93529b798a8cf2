//! Route tree construction from page files, and flattening for the sitemap.

use std::path::{Path, PathBuf};

use crate::errors::ParseError;
use crate::routes::tokenizer::{segment_name, segment_path, tokenize};
use crate::url_utils::with_base;

const CATCH_ALL_SUFFIX: &str = "(.*)*";

/// A route inferred from a page file, possibly with nested child routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteNode {
    /// Dash-joined segment names. Removed when a child takes over this position.
    pub name: Option<String>,
    pub path: String,
    pub file: PathBuf,
    pub children: Vec<RouteNode>,
}

/// A flattened, fully resolved route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRoute {
    pub path: String,
    pub file: PathBuf,
}

/// Builds the route tree for files under `pages_dir`.
///
/// `files` must already be sorted so the resulting tree is deterministic.
pub fn build_routes(files: &[PathBuf], pages_dir: &Path) -> Result<Vec<RouteNode>, ParseError> {
    let mut routes: Vec<RouteNode> = Vec::new();

    for file in files {
        let segments = relative_segments(file, pages_dir);
        let mut name = String::new();
        let mut path = String::new();
        // Indices into the nested `children` vectors of the current parent.
        let mut parent_trail: Vec<usize> = Vec::new();

        for segment in &segments {
            let tokens = tokenize(segment)?;
            let seg_name = segment_name(&tokens);
            if !name.is_empty() {
                name.push('-');
            }
            name.push_str(&seg_name);

            let siblings = children_at(&routes, &parent_trail);
            let existing = siblings.iter().position(|route| {
                route.name.as_deref() == Some(name.as_str()) && !route.path.ends_with(CATCH_ALL_SUFFIX)
            });

            if let Some(index) = existing {
                parent_trail.push(index);
                path.clear();
            } else if seg_name == "index" {
                if path.is_empty() {
                    path.push('/');
                }
            } else {
                path.push_str(&segment_path(&tokens));
            }
        }

        children_at_mut(&mut routes, &parent_trail).push(RouteNode {
            name: Some(name),
            path,
            file: file.clone(),
            children: Vec::new(),
        });
    }

    Ok(prepare_routes(routes, false))
}

fn relative_segments(file: &Path, pages_dir: &Path) -> Vec<String> {
    let relative = file.strip_prefix(pages_dir).unwrap_or(file).with_extension("");
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect()
}

fn children_at<'a>(routes: &'a [RouteNode], trail: &[usize]) -> &'a [RouteNode] {
    trail.iter().fold(routes, |level, &i| level[i].children.as_slice())
}

fn children_at_mut<'a>(routes: &'a mut Vec<RouteNode>, trail: &[usize]) -> &'a mut Vec<RouteNode> {
    trail.iter().fold(routes, |level, &i| &mut level[i].children)
}

/// Final clean-up of a freshly built tree: `-index` name suffixes go, nested
/// paths become relative, and a parent whose position is taken by an
/// empty-path child loses its name.
fn prepare_routes(routes: Vec<RouteNode>, nested: bool) -> Vec<RouteNode> {
    routes
        .into_iter()
        .map(|mut route| {
            route.name = route
                .name
                .map(|n| n.strip_suffix("-index").map(str::to_string).unwrap_or(n));
            if nested && let Some(relative) = route.path.strip_prefix('/') {
                route.path = relative.to_string();
            }
            route.children = prepare_routes(std::mem::take(&mut route.children), true);
            if route.children.iter().any(|child| child.path.is_empty()) {
                route.name = None;
            }
            route
        })
        .collect()
}

fn unpack(route: RouteNode, out: &mut Vec<PageRoute>) {
    let RouteNode { path, file, children, .. } = route;
    out.push(PageRoute {
        path: path.clone(),
        file,
    });
    for mut child in children {
        child.path = with_base(&child.path, &path);
        unpack(child, out);
    }
}

/// Flattens route trees into sitemap-eligible routes.
///
/// Children are resolved against their parent's path, routes with dynamic
/// segments are dropped, and duplicates merge by path: the first position is
/// kept while the later file wins.
pub fn normalise_pages_for_sitemap(routes: Vec<RouteNode>) -> Vec<PageRoute> {
    let mut flat = Vec::new();
    for route in routes {
        unpack(route, &mut flat);
    }

    let mut merged: Vec<PageRoute> = Vec::new();
    for page in flat.into_iter().filter(|p| !p.path.contains(':') && !p.path.contains('[')) {
        match merged.iter_mut().find(|existing| existing.path == page.path) {
            Some(existing) => existing.file = page.file,
            None => merged.push(page),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(pages: &Path, names: &[&str]) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = names.iter().map(|n| pages.join(n)).collect();
        files.sort();
        files
    }

    fn paths(routes: &[PageRoute]) -> Vec<&str> {
        routes.iter().map(|r| r.path.as_str()).collect()
    }

    #[test]
    fn test_static_and_dynamic_pages() {
        let pages = Path::new("/site/pages");
        let routes = build_routes(
            &files(pages, &["index.vue", "about.vue", "blog/[slug].vue", "blog/index.vue"]),
            pages,
        )
        .unwrap();

        let all: Vec<&str> = routes.iter().map(|r| r.path.as_str()).collect();
        assert!(all.contains(&"/blog/:slug"));

        let flat = normalise_pages_for_sitemap(routes);
        assert_eq!(paths(&flat), vec!["/about", "/blog", "/"]);
    }

    #[test]
    fn test_parent_page_with_nested_index() {
        let pages = Path::new("/pages");
        let routes = build_routes(&files(pages, &["blog.vue", "blog/index.vue", "blog/archive.vue"]), pages).unwrap();

        assert_eq!(routes.len(), 1);
        let parent = &routes[0];
        assert_eq!(parent.path, "/blog");
        assert_eq!(parent.name, None, "an empty-path child takes over the parent's name");
        let child_paths: Vec<&str> = parent.children.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(child_paths, vec!["archive", ""]);
        assert_eq!(parent.children[0].name.as_deref(), Some("blog-archive"));
        assert_eq!(parent.children[1].name.as_deref(), Some("blog"));

        let flat = normalise_pages_for_sitemap(routes);
        assert_eq!(paths(&flat), vec!["/blog", "/blog/archive"]);
        assert_eq!(flat[0].file, pages.join("blog/index.vue"));
    }

    #[test]
    fn test_catch_all_does_not_take_children() {
        let pages = Path::new("/pages");
        let routes = build_routes(&files(pages, &["[...slug].vue", "[...slug]/edit.vue"]), pages).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].path, "/:slug(.*)*");
        assert_eq!(routes[1].path, "/:slug(.*)*/edit");
        assert!(normalise_pages_for_sitemap(routes).is_empty());
    }

    #[test]
    fn test_optional_segments_render_as_optional_params() {
        let pages = Path::new("/pages");
        let routes = build_routes(&files(pages, &["[[lang]]/about.vue"]), pages).unwrap();
        assert_eq!(routes[0].path, "/:lang?/about");
        assert!(!routes[0].path.contains('['));
    }

    #[test]
    fn test_stray_closing_bracket_is_encoded() {
        let pages = Path::new("/pages");
        let routes = build_routes(&files(pages, &["a]b.vue"]), pages).unwrap();
        assert_eq!(routes[0].path, "/a%5Db");

        let flat = normalise_pages_for_sitemap(routes);
        assert_eq!(paths(&flat), vec!["/a%5Db"]);
        assert!(flat.iter().all(|r| !r.path.contains(']')));
    }

    #[test]
    fn test_parse_error_surfaces_segment() {
        let pages = Path::new("/pages");
        let err = build_routes(&files(pages, &["blog/[slug.vue"]), pages).unwrap_err();
        assert!(err.to_string().contains("[slug"));
    }
}

//! Scanning page directories for route files.
//!
//! A pages directory may hold a `.sitemapignore` file: one glob per line,
//! matched against paths relative to that directory. Blank lines and `#`
//! comments are skipped and a leading `/` is dropped, since every pattern is
//! already anchored at the directory. Negated (`!`) patterns are not
//! supported; they are logged and ignored.

use std::path::{Path, PathBuf};

use futures::future::join_all;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::errors::Result;
use crate::routes::tree::{PageRoute, RouteNode, build_routes, normalise_pages_for_sitemap};

/// Name of the optional per-directory ignore file (one glob per line).
pub const IGNORE_FILE: &str = ".sitemapignore";

/// Outcome of scanning all page directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagesScan {
    /// Static routes eligible for the sitemap.
    pub routes: Vec<PageRoute>,
    /// Route paths of ignored page files, to be excluded from the sitemap.
    pub ignored_paths: Vec<String>,
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions.iter().any(|wanted| wanted.trim_start_matches('.') == ext)
}

fn load_ignore_globs(dir: &Path) -> Result<Option<GlobSet>> {
    let ignore_file = dir.join(IGNORE_FILE);
    if !ignore_file.is_file() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for line in std::fs::read_to_string(&ignore_file)?.lines() {
        let pattern = line.trim();
        if pattern.is_empty() || pattern.starts_with('#') {
            continue;
        }
        if pattern.starts_with('!') {
            tracing::warn!("Ignoring negated pattern \"{}\" in {}", pattern, ignore_file.display());
            continue;
        }
        builder.add(Glob::new(pattern.trim_start_matches('/'))?);
    }
    Ok(Some(builder.build()?))
}

/// Lists page files under `dir` with one of `extensions`, sorted.
///
/// Returns `(kept, ignored)`, where ignored files matched the directory's
/// ignore file.
pub fn list_page_files(dir: &Path, extensions: &[String]) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let ignore = load_ignore_globs(dir)?;
    let mut kept = Vec::new();
    let mut ignored = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !has_extension(path, extensions) {
            continue;
        }
        let relative = path.strip_prefix(dir).unwrap_or(path);
        match &ignore {
            Some(globs) if globs.is_match(relative) => ignored.push(path.to_path_buf()),
            _ => kept.push(path.to_path_buf()),
        }
    }

    kept.sort();
    ignored.sort();
    Ok((kept, ignored))
}

fn scan_dir(dir: &Path, extensions: &[String]) -> Result<(Vec<RouteNode>, Vec<String>)> {
    let (files, ignored) = list_page_files(dir, extensions)?;
    tracing::debug!("Found {} page files ({} ignored) in {}", files.len(), ignored.len(), dir.display());

    let mut ignored_paths = Vec::with_capacity(ignored.len());
    for file in ignored {
        if let Some(route) = build_routes(std::slice::from_ref(&file), dir)?.into_iter().next() {
            ignored_paths.push(route.path);
        }
    }

    Ok((build_routes(&files, dir)?, ignored_paths))
}

/// Scans every pages directory concurrently and flattens the static routes.
///
/// Directories are independent: each produces its own route tree and the
/// trees are only merged once every scan has finished.
pub async fn resolve_pages_routes(dirs: &[PathBuf], extensions: &[String]) -> Result<PagesScan> {
    let scans = dirs.iter().cloned().map(|dir| {
        let extensions = extensions.to_vec();
        tokio::task::spawn_blocking(move || scan_dir(&dir, &extensions))
    });

    let mut all_routes = Vec::new();
    let mut ignored_paths = Vec::new();
    for joined in join_all(scans).await {
        let (routes, ignored) = joined??;
        all_routes.extend(routes);
        ignored_paths.extend(ignored);
    }

    Ok(PagesScan {
        routes: normalise_pages_for_sitemap(all_routes),
        ignored_paths,
    })
}

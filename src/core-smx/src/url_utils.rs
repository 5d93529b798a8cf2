//! URL path helpers: base paths, trailing slashes, joining and encoding.
//!
//! All helpers work on plain strings so they apply equally to root-relative
//! paths (`/blog/post`) and absolute URLs (`https://example.com/blog`).

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters `encodeURI` leaves untouched, plus `%` so already-encoded input
/// is not encoded twice.
const ENCODE_URI_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'#')
    .remove(b'%');

/// True if the input is already an absolute `http(s)` URL.
pub fn has_protocol(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// True for the empty string and the bare root `/`.
pub fn is_empty_url(input: &str) -> bool {
    input.is_empty() || input == "/"
}

/// Appends a `/` unless one is already present.
pub fn with_trailing_slash(input: &str) -> String {
    if input.ends_with('/') {
        input.to_string()
    } else {
        format!("{input}/")
    }
}

/// Removes one trailing `/`, keeping the root as `/`.
pub fn without_trailing_slash(input: &str) -> String {
    match input.strip_suffix('/') {
        Some("") => "/".to_string(),
        Some(stripped) => stripped.to_string(),
        None => input.to_string(),
    }
}

/// Joins URL parts with exactly one `/` between them. Empty parts and bare `/`
/// parts are skipped.
///
/// ```
/// # use core_smx::url_utils::join_url;
/// assert_eq!(join_url("https://example.com", &["/", "about"]), "https://example.com/about");
/// assert_eq!(join_url("fr", &["/about"]), "fr/about");
/// ```
pub fn join_url(base: &str, parts: &[&str]) -> String {
    let mut url = base.to_string();
    for part in parts.iter().filter(|p| !is_empty_url(p)) {
        if url.is_empty() {
            url = part.to_string();
        } else {
            let part = part.strip_prefix("./").or_else(|| part.strip_prefix('/')).unwrap_or(part);
            url = with_trailing_slash(&url) + part;
        }
    }
    url
}

fn starts_with_base(input: &str, base: &str) -> bool {
    input.strip_prefix(base).is_some_and(|rest| {
        rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') || rest.starts_with('#')
    })
}

/// Prefixes `input` with `base` unless it is absolute or already prefixed.
///
/// ```
/// # use core_smx::url_utils::with_base;
/// assert_eq!(with_base("/about", "/app/"), "/app/about");
/// assert_eq!(with_base("/app/about", "/app"), "/app/about");
/// assert_eq!(with_base("https://x.dev/a", "/app"), "https://x.dev/a");
/// ```
pub fn with_base(input: &str, base: &str) -> String {
    if is_empty_url(base) || has_protocol(input) {
        return input.to_string();
    }
    let base = without_trailing_slash(base);
    if starts_with_base(input, &base) {
        return input.to_string();
    }
    join_url(&base, &[input])
}

/// Removes a leading `base` from `input`, always returning a `/`-rooted path.
pub fn without_base(input: &str, base: &str) -> String {
    if is_empty_url(base) {
        return input.to_string();
    }
    let base = without_trailing_slash(base);
    if !starts_with_base(input, &base) {
        return input.to_string();
    }
    let trimmed = &input[base.len()..];
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Origin of the site with the base path removed from its end.
pub fn site_url_without_base(site_url: &str, base: &str) -> String {
    let base = without_trailing_slash(base);
    let site = without_trailing_slash(site_url);
    if is_empty_url(&base) {
        return site;
    }
    site.strip_suffix(base.as_str()).map(str::to_string).unwrap_or(site)
}

/// Resolves a root-relative path into an absolute URL under `site_url` + `base`.
///
/// ```
/// # use core_smx::url_utils::url_with_base;
/// assert_eq!(url_with_base("/about", "/", "https://example.com/"), "https://example.com/about");
/// assert_eq!(url_with_base("/docs/a", "/docs/", "https://example.com/docs"), "https://example.com/docs/a");
/// ```
pub fn url_with_base(url: &str, base: &str, site_url: &str) -> String {
    let trimmed_base = without_trailing_slash(base);
    let relative = if is_empty_url(&trimmed_base) {
        url.strip_prefix('/').unwrap_or(url)
    } else {
        url.strip_prefix(trimmed_base.as_str()).unwrap_or(url)
    };
    let origin = site_url_without_base(site_url, base);
    let joined = join_url(&origin, &[&trimmed_base, relative]);
    if url.ends_with('/') {
        with_trailing_slash(&joined)
    } else {
        joined
    }
}

/// Percent-encodes a URL the way `encodeURI` does.
pub fn encode_uri(input: &str) -> String {
    utf8_percent_encode(input, ENCODE_URI_SET).to_string()
}

/// True when the last path segment looks like a file (`/feed.xml`).
pub fn looks_like_file(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let path = if has_protocol(path) {
        path.splitn(4, '/').nth(3).unwrap_or("")
    } else {
        path
    };
    path.rsplit('/').next().is_some_and(|last| last.contains('.'))
}

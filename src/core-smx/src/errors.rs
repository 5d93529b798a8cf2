//! Error types for sitemap generation.

use thiserror::Error;

/// Failure to tokenize one segment of a page file name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A `[` was opened but the segment ended before the matching `]`.
    #[error("Unfinished param \"{param}\" in segment \"{segment}\"")]
    UnfinishedParam { segment: String, param: String },

    /// A parameter was closed without any name characters, e.g. `[]`.
    #[error("Empty param in segment \"{segment}\"")]
    EmptyParam { segment: String },
}

/// Main error type for sitemap generation operations.
#[derive(Debug, Error)]
pub enum SitemapError {
    /// A page file name could not be turned into a route
    #[error("Route parse error: {0}")]
    RouteParse(#[from] ParseError),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Endpoint answered with something other than the expected payload
    #[error("Unexpected response from {url}: {reason}")]
    UnexpectedResponse { url: String, reason: String },

    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// JSON payload or config could not be (de)serialized
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Reading pages or writing output failed
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Walking a pages directory failed
    #[error("Directory walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    /// Regex filter rule failed to compile
    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    /// Route pattern failed to compile
    #[error("Glob pattern error: {0}")]
    GlobError(#[from] globset::Error),

    /// Generation needs an absolute site URL to produce `<loc>` values
    #[error("No site URL configured: set `siteUrl` in the sitemap config or SITEMAP_SITE_URL")]
    MissingSiteUrl,

    /// A concurrent page scan task failed to complete
    #[error("Page scan task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),

    /// Config values that parse but cannot be used together
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Type alias for Result with SitemapError
pub type Result<T> = std::result::Result<T, SitemapError>;

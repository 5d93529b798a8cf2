//! Sitemap generation for file-routed web sites.
//!
//! URLs come from inferred page routes, configuration and optional remote
//! endpoints. They are merged, filtered and normalised by
//! [`sitemap::generate_entries`], then serialized to `sitemap.xml` or to a
//! sitemap index with shards.

pub mod common;
pub mod errors;
pub mod routes;
pub mod sitemap;
pub mod url_utils;

pub use errors::{ParseError, Result, SitemapError};
pub use sitemap::{SitemapConfig, SitemapEntry, SitemapGenerator};

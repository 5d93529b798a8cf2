//! URL collection, merging and sitemap serialization.

pub mod builder;
pub mod config;
pub mod date;
pub mod entry;
pub mod filter;
pub mod generator;
pub mod images;
pub mod pipeline;
pub mod rules;
pub mod sources;
pub mod xsl;

pub use builder::{MAX_SITEMAP_SIZE, RenderContext, RenderStage, Shard, SitemapIndex, build_sitemap, build_sitemap_index};
pub use config::{NamedShard, ShardOverrides, ShardsConfig, SitemapConfig};
pub use entry::{
    Alternative, ChangeFreq, EntryFields, ImageEntry, LastMod, PartialEntry, RawUrlInput, SitemapEntry,
    SitemapIndexEntry, VideoEntry,
};
pub use filter::{FilterRule, UrlFilter, create_filter};
pub use generator::{Outcome, SitemapGenerator, write_routes_cache};
pub use pipeline::generate_entries;
pub use rules::{RouteRule, RouteRuleResolver, RouteRuleTable};
pub use sources::{HttpFetcher, UrlFetcher, UrlSources};

//! File-based route inference.
//!
//! Page files are tokenized segment by segment, assembled into a route tree,
//! and flattened into the static routes a sitemap can list.

pub mod pages;
pub mod tokenizer;
pub mod tree;

pub use pages::{PagesScan, list_page_files, resolve_pages_routes};
pub use tokenizer::{RouteToken, TokenKind, tokenize};
pub use tree::{PageRoute, RouteNode, build_routes, normalise_pages_for_sitemap};

//! HTTP serving for sitemaps generated by `core_smx`.

pub mod errors;
pub mod routes;

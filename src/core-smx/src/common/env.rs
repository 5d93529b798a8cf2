//! Environment variable lookups shared by the CLI and the server.

use std::{net::SocketAddr, num::ParseIntError, path::PathBuf};

use thiserror::Error;

pub const SITE_URL_VAR: &str = "SITEMAP_SITE_URL";
pub const TRAILING_SLASH_VAR: &str = "SITEMAP_TRAILING_SLASH";
pub const CONFIG_PATH_VAR: &str = "SITEMAP_CONFIG";

/// Gets the host:port from the env vars HOST and PORT.
/// Uses defaults `127.0.0.1:3000` if env vars are empty.
pub fn get_server_address() -> Result<SocketAddr, HostPortError> {
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = match std::env::var("PORT") {
        Ok(p) => p.parse::<u16>()?,
        Err(_) => 3000,
    };
    let address = format!("{}:{}", host, port).parse::<SocketAddr>()?;
    Ok(address)
}

#[derive(Debug, Error)]
pub enum HostPortError {
    #[error("Invalid port: {0}")]
    InvalidPort(#[from] ParseIntError),
    #[error("Invalid hostname: {0}")]
    InvalidHostname(#[from] std::net::AddrParseError),
}

/// Prefixes `https://` onto a site URL that has no scheme. Empty input stays empty.
pub fn normalise_site_url(site_url: &str) -> String {
    let site_url = site_url.trim();
    if site_url.is_empty() || site_url.starts_with("http") {
        site_url.to_string()
    } else {
        format!("https://{site_url}")
    }
}

/// Site URL from `SITEMAP_SITE_URL`, scheme-normalised.
pub fn site_url_from_env() -> Option<String> {
    std::env::var(SITE_URL_VAR)
        .ok()
        .map(|v| normalise_site_url(&v))
        .filter(|v| !v.is_empty())
}

/// `Some(true)` only when `SITEMAP_TRAILING_SLASH` is literally `"true"`.
pub fn trailing_slash_from_env() -> Option<bool> {
    std::env::var(TRAILING_SLASH_VAR).ok().map(|v| v == "true")
}

/// Config file path from `SITEMAP_CONFIG`, defaulting to `sitemap.json`.
pub fn config_path_from_env() -> PathBuf {
    std::env::var(CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("sitemap.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_site_url() {
        assert_eq!(normalise_site_url("example.com"), "https://example.com");
        assert_eq!(normalise_site_url("http://localhost:3000"), "http://localhost:3000");
        assert_eq!(normalise_site_url("  "), "");
    }
}

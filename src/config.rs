use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Settings for the build pipeline and the local preview server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    pub src_dir: PathBuf,
    pub dist_dir: PathBuf,
    pub examples_dir: PathBuf,
    pub readme_path: PathBuf,
    /// Public URL of the directory holding the `.min` files, without a trailing slash.
    pub cdn_base: String,
    pub bind_addr: SocketAddr,
}

pub fn default_cdn_base() -> String {
    format!(
        "https://cdn.jsdelivr.net/npm/civic-chat@{}/dist",
        env!("CARGO_PKG_VERSION")
    )
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            src_dir: PathBuf::from("assets"),
            dist_dir: PathBuf::from("dist"),
            examples_dir: PathBuf::from("demos"),
            readme_path: PathBuf::from("README.md"),
            cdn_base: default_cdn_base(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

impl BuildConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let bind_addr = match std::env::var("BIND_ADDR") {
            Ok(addr) => addr.parse().context("failed to parse BIND_ADDR")?,
            Err(_) => defaults.bind_addr,
        };

        let path_var = |name: &str, fallback: PathBuf| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(fallback)
        };

        let cdn_base = std::env::var("CIVIC_CHAT_CDN_BASE")
            .ok()
            .filter(|v| !v.is_empty())
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.cdn_base);

        Ok(Self {
            src_dir: path_var("CIVIC_CHAT_SRC_DIR", defaults.src_dir),
            dist_dir: path_var("CIVIC_CHAT_DIST_DIR", defaults.dist_dir),
            examples_dir: path_var("CIVIC_CHAT_EXAMPLES_DIR", defaults.examples_dir),
            readme_path: path_var("CIVIC_CHAT_README", defaults.readme_path),
            cdn_base,
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_layout() {
        let cfg = BuildConfig::default();
        assert_eq!(cfg.dist_dir, PathBuf::from("dist"));
        assert_eq!(cfg.examples_dir, PathBuf::from("demos"));
        assert_eq!(cfg.readme_path, PathBuf::from("README.md"));
        assert!(cfg.cdn_base.ends_with("/dist"));
        assert!(!cfg.cdn_base.ends_with('/'));
    }
}

//! Mount configuration: a TOML file with CLI overrides.
//!
//! The loader is tolerant: a missing file falls back to defaults so a first
//! `trailfs --api-key ... /mnt/tracker` run works without any setup, and a
//! malformed file is reported but does not abort the mount.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use tracing::warn;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// Personal API key used for every backend request.
    pub api_key: String,
    /// Default mount path when none is given on the command line.
    pub mount_path: Option<PathBuf>,
    /// Pass `allow_other` to the kernel so other local users see the mount.
    pub allow_other: bool,
    /// Default freshness window for cached query views, in seconds.
    pub cache_ttl_seconds: u64,
    /// Upper bound on in-memory attachment cache entries.
    pub cache_max_entries: usize,
    /// Default log filter when `RUST_LOG` is not set.
    pub log_level: String,
    /// Log destination; stderr when unset.
    pub log_file: Option<PathBuf>,
    /// Count backend requests per operation and log a summary at unmount.
    pub api_stats: bool,
    /// Expose the `initiatives/` subtree at the mount root.
    pub initiatives: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            mount_path: None,
            allow_other: false,
            cache_ttl_seconds: 60,
            cache_max_entries: 256,
            log_level: "trailfs=info".to_string(),
            log_file: None,
            api_stats: false,
            initiatives: true,
        }
    }
}

/// Platform directories for the config file, cache database, and blob cache.
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "trailfs")
}

/// Default config path: `<config-dir>/trailfs/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}

/// Default cache database path: `<data-dir>/trailfs/cache.db`.
pub fn default_db_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.data_dir().join("cache.db"))
}

/// Default attachment blob directory: `<cache-dir>/trailfs/files`.
pub fn default_blob_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.cache_dir().join("files"))
}

pub fn load_config(path: Option<&Path>) -> Config {
    let resolved = match path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) => p,
            None => return Config::default(),
        },
    };

    if !resolved.exists() {
        return Config::default();
    }

    let content = match fs::read_to_string(&resolved) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %resolved.display(), "cannot read config: {e}; using defaults");
            return Config::default();
        }
    };

    match toml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %resolved.display(), "cannot parse config: {e}; using defaults");
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_config(Some(Path::new("/nonexistent/trailfs.toml")));
        assert_eq!(cfg.cache_ttl_seconds, 60);
        assert!(cfg.initiatives);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_key = \"lin_api_123\"\ncache_ttl_seconds = 5\n").unwrap();
        let cfg = load_config(Some(&path));
        assert_eq!(cfg.api_key, "lin_api_123");
        assert_eq!(cfg.cache_ttl_seconds, 5);
        assert_eq!(cfg.cache_max_entries, 256);
    }
}

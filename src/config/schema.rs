//! Configuration schema for gorun
//!
//! Configuration is stored at `~/.config/gorun/config.toml`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Compilation cache settings
    pub cache: CacheConfig,

    /// Go toolchain settings
    pub toolchain: ToolchainConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Compilation cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Remove binaries not used for N days; also the sweep interval
    pub retention_days: u32,

    /// Directory holding cache roots (defaults to the platform temp dir)
    pub temp_dir: Option<PathBuf>,

    /// How many disambiguated cache root names to try before giving up
    pub max_root_attempts: u32,
}

impl CacheConfig {
    /// Retention window as a duration
    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention_days) * 24 * 60 * 60)
    }

    /// Temp root to place cache roots under
    pub fn temp_root(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retention_days: 7,
            temp_dir: None,
            max_root_attempts: 1000,
        }
    }
}

/// Go toolchain configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Go installation root; `<go_root>/bin/go` is tried first
    pub go_root: Option<PathBuf>,

    /// Extra flags passed to `go build`
    pub build_flags: Vec<String>,

    /// Environment variables layered onto the build environment
    pub env: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[cache]"));
        assert!(toml.contains("retention_days = 7"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.cache.retention_days, 7);
        assert_eq!(config.cache.max_root_attempts, 1000);
        assert!(config.toolchain.go_root.is_none());
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [toolchain]
            go_root = "/opt/go"
            build_flags = ["-trimpath"]

            [toolchain.env]
            CGO_ENABLED = "0"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.toolchain.go_root, Some(PathBuf::from("/opt/go")));
        assert_eq!(config.toolchain.build_flags, vec!["-trimpath"]);
        assert_eq!(config.toolchain.env.get("CGO_ENABLED").map(String::as_str), Some("0"));
        assert_eq!(config.general.log_format, "text"); // default preserved
    }

    #[test]
    fn retention_in_seconds() {
        let cache = CacheConfig {
            retention_days: 2,
            ..CacheConfig::default()
        };
        assert_eq!(cache.retention(), Duration::from_secs(2 * 86_400));
    }

    #[test]
    fn temp_root_override() {
        let cache = CacheConfig {
            temp_dir: Some(PathBuf::from("/var/tmp/private")),
            ..CacheConfig::default()
        };
        assert_eq!(cache.temp_root(), PathBuf::from("/var/tmp/private"));
        assert_eq!(CacheConfig::default().temp_root(), std::env::temp_dir());
    }
}

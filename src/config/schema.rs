//! Configuration schema for repro-fetch
//!
//! Configuration is stored at `~/.config/repro-fetch/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Content cache settings
    pub cache: CacheConfig,

    /// Distro driver selection
    pub distro: DistroConfig,

    /// Provider URL templates
    pub providers: ProvidersConfig,

    /// Fetch orchestrator defaults
    pub download: DownloadConfig,
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

/// Cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root (default: `~/.cache/repro-fetch`)
    pub dir: Option<PathBuf>,
}

/// Distro driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistroConfig {
    /// `auto`, `debian`, `ubuntu`, `alpine` or `none`
    pub name: String,
}

impl Default for DistroConfig {
    fn default() -> Self {
        Self {
            name: "auto".to_string(),
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// URL templates tried in order; empty means the driver defaults.
    /// Placeholders: `{{.Name}}`, `{{.Basename}}`, `{{.SHA256}}`
    pub urls: Vec<String>,
}

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Skip files whose exact package version is installed
    pub skip_installed: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            skip_installed: true,
        }
    }
}

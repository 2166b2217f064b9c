//! Boot manager configuration.
//!
//! Configuration is an explicit value handed to the components that need
//! it. It is read from an optional TOML file on the boot partition:
//!
//! ```toml
//! mount_point = "/mnt"
//! boot_dir = "/boot"
//! timezone = "Europe/Amsterdam"
//! keyboard_layout = "us"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/boot/bootmgr.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ManagerConfig {
    /// Where the data partition is mounted.
    pub mount_point: PathBuf,
    /// Mounted boot medium holding the shared archive and Wi-Fi credentials.
    pub boot_dir: PathBuf,
    /// Archive under `boot_dir` extracted into `shared/`.
    pub shared_archive: String,
    /// Wi-Fi credentials file under `boot_dir`.
    pub wifi_credentials: String,
    /// Wired interface configured for static addressing.
    pub network_interface: String,
    /// Nameserver used when a static address is given without `dns=`.
    pub fallback_dns: String,
    pub timezone: Option<String>,
    pub keyboard_layout: Option<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            mount_point: PathBuf::from("/mnt"),
            boot_dir: PathBuf::from("/boot"),
            shared_archive: "shared.tgz".to_string(),
            wifi_credentials: "wpa_supplicant.conf".to_string(),
            network_interface: "eth0".to_string(),
            fallback_dns: "8.8.8.8".to_string(),
            timezone: None,
            keyboard_layout: None,
        }
    }
}

impl ManagerConfig {
    pub fn shared_archive_path(&self) -> PathBuf {
        self.boot_dir.join(&self.shared_archive)
    }

    pub fn wifi_credentials_path(&self) -> PathBuf {
        self.boot_dir.join(&self.wifi_credentials)
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ManagerConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading boot manager config '{}'", path.display()))?;
    let config: ManagerConfig = toml::from_str(&text)
        .with_context(|| format!("parsing boot manager config '{}'", path.display()))?;
    Ok(normalize(config))
}

/// Load configuration, falling back to defaults when the file is absent.
pub fn load_config_or_default(path: &Path) -> Result<ManagerConfig> {
    if !path.exists() {
        tracing::debug!("no config at {}, using defaults", path.display());
        return Ok(ManagerConfig::default());
    }
    load_config(path)
}

fn normalize(mut config: ManagerConfig) -> ManagerConfig {
    config.timezone = non_empty(config.timezone);
    config.keyboard_layout = non_empty(config.keyboard_layout);
    config
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

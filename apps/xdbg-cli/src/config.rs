//! xdbg configuration.
//!
//! Stored as TOML:
//! - Linux/macOS: `~/.config/xdbg/xdbg.toml`
//! - Windows: `%APPDATA%/xdbg/xdbg.toml`
//!
//! A path given on the command line replaces the default location.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use xdbg_server::DebuggerConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Expressions evaluated after every break.
    #[serde(default)]
    pub watch: Vec<String>,

    #[serde(default)]
    pub debugger: DebuggerConfig,
}

impl Config {
    /// Loads `path` (or the default location), writing a default file if
    /// none exists yet.
    pub fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path,
            None => config_path(),
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration read");
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("xdbg").join("xdbg.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("xdbg")
            .join("xdbg.toml")
    }
}

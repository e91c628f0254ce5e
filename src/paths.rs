//! Application directory structure for jupyter-mobile.
//!
//! Resolves the two directories the client needs and creates them on first
//! launch:
//!
//! - Config:    `~/.config/jupyter-mobile/`  (holds `settings.toml`)
//! - Logs:      `~/Library/Logs/jupyter-mobile/` on macOS, XDG data `logs/` elsewhere

use std::path::{Path, PathBuf};
use tracing::info;

const APP_NAME: &str = "jupyter-mobile";
const SETTINGS_FILE: &str = "settings.toml";

/// Resolved application directory paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Human-editable config: `~/.config/jupyter-mobile/`
    pub config: PathBuf,
    /// Application logs
    pub logs: PathBuf,
}

impl AppPaths {
    /// Resolve all paths from the user's home directory.
    /// Does not create any directories; call `ensure()` for that.
    pub fn resolve() -> Option<Self> {
        let home = std::env::var("HOME").ok().map(PathBuf::from)?;
        Some(Self {
            config: resolve_config_dir(&home),
            logs: resolve_log_dir(&home),
        })
    }

    /// Use `config` for settings instead of the resolved default.
    pub fn with_config_dir(mut self, config: PathBuf) -> Self {
        self.config = config;
        self
    }

    /// Full path to the persisted settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config.join(SETTINGS_FILE)
    }

    /// Create all directories that don't already exist.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [&self.config, &self.logs] {
            std::fs::create_dir_all(dir)?;
            info!("ensured directory: {}", dir.display());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Platform-specific path resolution
// ---------------------------------------------------------------------------

fn resolve_config_dir(home: &Path) -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join(APP_NAME)
    } else {
        home.join(".config").join(APP_NAME)
    }
}

#[cfg(target_os = "macos")]
fn resolve_log_dir(home: &Path) -> PathBuf {
    home.join("Library").join("Logs").join(APP_NAME)
}

#[cfg(not(target_os = "macos"))]
fn resolve_log_dir(home: &Path) -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg).join(APP_NAME).join("logs")
    } else {
        home.join(".local").join("share").join(APP_NAME).join("logs")
    }
}

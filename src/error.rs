//! Error types for the jupyter-mobile library surface.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to read, write or watch the persisted settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {path} is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to encode settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to watch settings file: {0}")]
    Watch(#[from] notify::Error),
}

impl SettingsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

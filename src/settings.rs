//! Persisted user settings: Jupyter server address and auth token.
//!
//! Settings live in a small TOML file (`settings.toml`). The store loads it
//! once, publishes the value through a `watch` channel, and republishes on
//! every successful save. With [`SettingsStore::watch_external`] enabled,
//! edits made to the file by another process are picked up too.
//!
//! The two fields are independent keys: saving one never clobbers the other,
//! and writes are serialized so that the last write to a key wins.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::error::SettingsError;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8888";

const FILE_HEADER: &str = "# jupyter-mobile settings. Edited by the app; safe to edit by hand.\n\n";

/// User-configurable connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root address of the Jupyter server.
    pub server_url: String,
    /// Optional auth token; empty means no `?token=` parameter.
    pub token: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            token: String::new(),
        }
    }
}

/// Owns the settings file and the observable settings value.
pub struct SettingsStore {
    path: PathBuf,
    tx: Arc<watch::Sender<Settings>>,
    write_lock: Mutex<()>,
    watcher: Option<RecommendedWatcher>,
}

impl SettingsStore {
    /// Load settings from `path`. A missing file yields the defaults.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let settings = read_settings(&path).await?;
        info!(
            target: "settings",
            path = %path.display(),
            server_url = %settings.server_url,
            has_token = !settings.token.is_empty(),
            "Settings loaded"
        );
        let (tx, _rx) = watch::channel(settings);
        Ok(Self {
            path,
            tx: Arc::new(tx),
            write_lock: Mutex::new(()),
            watcher: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subscribe to the live settings value.
    pub fn load(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    /// Snapshot of the current settings.
    pub fn current(&self) -> Settings {
        self.tx.borrow().clone()
    }

    pub async fn save_server_url(&self, url: &str) -> Result<(), SettingsError> {
        self.update(|settings| settings.server_url = url.to_string())
            .await
    }

    pub async fn save_token(&self, token: &str) -> Result<(), SettingsError> {
        self.update(|settings| settings.token = token.to_string())
            .await
    }

    /// Apply `edit` to the latest settings, persist, then publish.
    ///
    /// Subscribers are only notified when the value actually changed.
    async fn update<F>(&self, edit: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut Settings),
    {
        let _guard = self.write_lock.lock().await;
        let mut next = self.current();
        edit(&mut next);
        write_settings(&self.path, &next).await?;
        debug!(target: "settings", path = %self.path.display(), "Settings written");
        self.tx.send_if_modified(move |current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        Ok(())
    }

    /// Start republishing settings when `settings.toml` changes on disk.
    ///
    /// Watches the parent directory, since editors usually replace the file
    /// via rename. Unparseable content is logged and ignored.
    pub fn watch_external(&mut self) -> Result<(), SettingsError> {
        if self.watcher.is_some() {
            return Ok(());
        }
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| SettingsError::io(&parent, e))?;

        let target = self.path.clone();
        let tx = Arc::clone(&self.tx);
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        return;
                    }
                    let affects_target = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == target.file_name());
                    if affects_target {
                        reload_from_disk(&target, &tx);
                    }
                }
                Err(e) => warn!(target: "settings", "Watch error: {e}"),
            }
        })?;
        watcher.watch(&parent, RecursiveMode::NonRecursive)?;
        info!(target: "settings", dir = %parent.display(), "Watching for external settings edits");
        self.watcher = Some(watcher);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File I/O helpers
// ---------------------------------------------------------------------------

/// Parse settings TOML; missing keys take their defaults.
pub fn parse_settings(content: &str) -> Result<Settings, toml::de::Error> {
    toml::from_str(content)
}

async fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => parse_settings(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
        Err(e) => Err(SettingsError::io(path, e)),
    }
}

/// Write to a sibling temp file, flush it to disk, then rename it over `path`.
///
/// The temp file is removed when any step after its creation fails.
async fn write_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SettingsError::io(parent, e))?;
    }
    let mut content = String::from(FILE_HEADER);
    content.push_str(&toml::to_string(settings)?);

    let tmp = path.with_extension("toml.tmp");
    let result = async {
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| SettingsError::io(&tmp, e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| SettingsError::io(&tmp, e))?;
        file.sync_all().await.map_err(|e| SettingsError::io(&tmp, e))?;
        drop(file);
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| SettingsError::io(path, e))
    }
    .await;

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            debug!(target: "settings", path = %tmp.display(), "Temp file not removed: {e}");
        }
        return result;
    }

    // Persist the rename itself.
    #[cfg(unix)]
    if let Some(parent) = parent {
        match tokio::fs::File::open(parent).await {
            Ok(dir) => {
                if let Err(e) = dir.sync_all().await {
                    debug!(target: "settings", dir = %parent.display(), "Directory sync failed: {e}");
                }
            }
            Err(e) => debug!(target: "settings", dir = %parent.display(), "Directory sync skipped: {e}"),
        }
    }
    Ok(())
}

fn reload_from_disk(path: &Path, tx: &watch::Sender<Settings>) {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            debug!(target: "settings", path = %path.display(), "Skipping reload: {e}");
            return;
        }
    };
    match parse_settings(&content) {
        Ok(next) => {
            let changed = tx.send_if_modified(|current| {
                if *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            });
            if changed {
                info!(target: "settings", path = %path.display(), "Settings reloaded from disk");
            }
        }
        Err(e) => warn!(target: "settings", path = %path.display(), "Ignoring invalid settings edit: {e}"),
    }
}

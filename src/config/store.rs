//! Configuration store - TOML file with a lock-free snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use super::schema::AppConfig;
use crate::error::{AppError, Result};

/// Holds the parsed configuration and its backing file path.
///
/// `get()` hands out a cheap snapshot; `set()` persists and swaps it.
pub struct ConfigStore {
    path: PathBuf,
    current: ArcSwap<AppConfig>,
}

impl ConfigStore {
    /// Load the configuration from `path`. A missing file yields defaults
    /// without creating the file.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)
                .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            info!(
                "config file {} not found, using defaults",
                path.display()
            );
            AppConfig::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            current: ArcSwap::from_pointee(config),
        })
    }

    /// Snapshot of the current configuration.
    pub fn get(&self) -> Arc<AppConfig> {
        self.current.load_full()
    }

    /// Persist a new configuration and publish it.
    pub fn set(&self, config: AppConfig) -> Result<()> {
        let raw = toml::to_string_pretty(&config)
            .map_err(|e| AppError::Config(format!("serialize config: {}", e)))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, raw)?;
        self.current.store(Arc::new(config));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::load(&dir.path().join("gadgetswitch.toml")).unwrap();
        assert!(store.get().templates.is_empty());
    }

    #[test]
    fn set_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gadgetswitch.toml");

        let store = ConfigStore::load(&path).unwrap();
        let mut config = (*store.get()).clone();
        config.initial_mode = Some("storage".to_string());
        store.set(config).unwrap();

        assert_eq!(store.get().initial_mode.as_deref(), Some("storage"));

        let reloaded = ConfigStore::load(&path).unwrap();
        assert_eq!(reloaded.get().initial_mode.as_deref(), Some("storage"));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gadgetswitch.toml");
        std::fs::write(&path, "this is not toml = [").unwrap();

        let err = ConfigStore::load(&path).err();
        assert!(matches!(err, Some(AppError::Config(_))));
    }
}

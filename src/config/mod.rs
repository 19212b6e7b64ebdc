//! Layered configuration.
//!
//! - [`layer`]: layer backends ([`MemoryLayer`], [`YamlFileLayer`]) behind the
//!   [`LayerSource`] / [`WritableLayer`] traits
//! - [`store`]: [`LayeredConfigStore`], which resolves values user layer first, then global
//! - [`settings`]: [`Settings`], typed accessors with documented defaults
//!
//! [`SettingsPaths`] locates the layer files of an installation and opens the store.

pub mod layer;
pub mod settings;
pub mod store;

pub use layer::{LayerSource, MemoryLayer, WritableLayer, YamlFileLayer};
pub use settings::{DEFAULT_UPDATE_CHANNEL, EncodeParam, FormGeometry, IdList, Settings, names};
pub use store::{ChangeKind, LayerScope, LayeredConfigStore, ROOT_NODE, SettingChange, StoreError};

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Locations of the two layer files.
///
/// - Global layer (`Global.yaml`): machine-wide settings written by the installer or an
///   administrator. Its absence means a portable install.
/// - User layer (`User.yaml`): per-user settings, created on first save.
#[derive(Debug, Clone)]
pub struct SettingsPaths {
    config_dir: Utf8PathBuf,
    global_layer_path: Utf8PathBuf,
    user_layer_path: Utf8PathBuf,
}

impl SettingsPaths {
    /// Use `config_dir` for both layers, creating it if needed.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing the layer files (e.g., "CopyPath Data")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            global_layer_path: config_dir.join("Global.yaml"),
            user_layer_path: config_dir.join("User.yaml"),
            config_dir,
        })
    }

    /// Keep the user layer in `config_dir` but read the global layer from elsewhere.
    pub fn with_global_layer<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.global_layer_path = path.as_ref().to_path_buf();
        self
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn global_layer_path(&self) -> &Utf8Path {
        &self.global_layer_path
    }

    pub fn user_layer_path(&self) -> &Utf8Path {
        &self.user_layer_path
    }

    /// Open both layers and build the store.
    ///
    /// Bad file contents never fail here: unreadable layers open empty (see
    /// [`YamlFileLayer::open`]).
    pub fn open_store(&self) -> LayeredConfigStore {
        let user = YamlFileLayer::open(&self.user_layer_path);
        let global = YamlFileLayer::open_existing(&self.global_layer_path);

        match &global {
            Some(_) => tracing::info!("Using global settings from {}", self.global_layer_path),
            None => tracing::info!(
                "No global settings at {}, running portable",
                self.global_layer_path
            ),
        }

        LayeredConfigStore::new(
            Box::new(user),
            global.map(|layer| Box::new(layer) as Box<dyn LayerSource>),
        )
    }

    pub fn open_settings(&self) -> Settings {
        Settings::new(self.open_store())
    }
}

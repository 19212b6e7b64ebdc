//! Configuration layer backends.
//!
//! A layer is a tree of named nodes holding named scalars. The global layer is only ever
//! read through [`LayerSource`]; the user layer is additionally a [`WritableLayer`].

use crate::config::StoreError;
use crate::models::{LayerNode, SettingValue};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::fs;

/// Read access to a configuration layer.
pub trait LayerSource: Send + Sync + fmt::Debug {
    /// Value `name` stored directly under `node` (`""` is the root).
    fn read(&self, node: &str, name: &str) -> Option<SettingValue>;

    /// Names of the child nodes of `node`, in storage order.
    fn child_names(&self, node: &str) -> Vec<String>;

    /// Names of the values stored under `node`, in storage order.
    fn value_names(&self, node: &str) -> Vec<String>;

    fn has_node(&self, node: &str) -> bool;
}

/// Write access to a configuration layer.
pub trait WritableLayer: LayerSource {
    fn write(&mut self, node: &str, name: &str, value: SettingValue) -> Result<(), StoreError>;

    /// Remove one value. Returns whether it existed.
    fn delete_value(&mut self, node: &str, name: &str) -> Result<bool, StoreError>;

    /// Remove a node and its whole subtree. Returns whether it existed.
    fn delete_node(&mut self, node: &str) -> Result<bool, StoreError>;

    /// Persist pending changes to the backing storage, if any.
    fn flush(&mut self) -> Result<(), StoreError>;
}

/// Layer held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLayer {
    root: LayerNode,
}

impl MemoryLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_root(root: LayerNode) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &LayerNode {
        &self.root
    }

    /// Builder-style value insertion, handy for seeding a read-only global layer.
    pub fn with_value(mut self, node: &str, name: &str, value: impl Into<SettingValue>) -> Self {
        self.root
            .node_mut_or_create(node)
            .values
            .insert(name.to_string(), value.into());
        self
    }
}

impl LayerSource for MemoryLayer {
    fn read(&self, node: &str, name: &str) -> Option<SettingValue> {
        self.root.node(node)?.values.get(name).cloned()
    }

    fn child_names(&self, node: &str) -> Vec<String> {
        self.root
            .node(node)
            .map(|n| n.nodes.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn value_names(&self, node: &str) -> Vec<String> {
        self.root
            .node(node)
            .map(|n| n.values.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn has_node(&self, node: &str) -> bool {
        self.root.node(node).is_some()
    }
}

impl WritableLayer for MemoryLayer {
    fn write(&mut self, node: &str, name: &str, value: SettingValue) -> Result<(), StoreError> {
        self.root
            .node_mut_or_create(node)
            .values
            .insert(name.to_string(), value);
        Ok(())
    }

    fn delete_value(&mut self, node: &str, name: &str) -> Result<bool, StoreError> {
        Ok(self
            .root
            .node_mut(node)
            .map(|n| n.values.shift_remove(name).is_some())
            .unwrap_or(false))
    }

    fn delete_node(&mut self, node: &str) -> Result<bool, StoreError> {
        Ok(self.root.remove_node(node))
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Layer persisted as a YAML document.
///
/// Changes are kept in memory and written back on [`WritableLayer::flush`].
///
/// A file that cannot be read or parsed opens as an empty layer. Before such a file is
/// first overwritten it is moved to [`backup_path`](Self::backup_path).
#[derive(Debug)]
pub struct YamlFileLayer {
    path: Utf8PathBuf,
    layer: MemoryLayer,
    dirty: bool,
    unreadable: bool,
}

impl YamlFileLayer {
    /// Open the layer stored at `path`. A missing file opens as an empty layer and is
    /// created on the first flush.
    pub fn open<P: AsRef<Utf8Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            tracing::debug!("Layer file not found at {}, starting empty", path);
            return Self::empty(path, false);
        }

        match Self::read_root(&path) {
            Ok(root) => {
                tracing::info!("Loaded settings layer from {}", path);
                Self {
                    path,
                    layer: MemoryLayer::from_root(root),
                    dirty: false,
                    unreadable: false,
                }
            }
            Err(e) => {
                tracing::warn!("{:#}; continuing with an empty layer", e);
                Self::empty(path, true)
            }
        }
    }

    /// Open an existing layer file, returning `None` when it does not exist.
    ///
    /// Used for the machine-wide layer, whose absence means a portable install.
    pub fn open_existing<P: AsRef<Utf8Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return None;
        }
        Some(Self::open(path))
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the file existed but could not be loaded.
    pub fn is_unreadable(&self) -> bool {
        self.unreadable
    }

    /// Where an unreadable file is kept once the layer is saved, e.g. `User.yaml.bak`.
    pub fn backup_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}.bak", self.path))
    }

    fn empty(path: Utf8PathBuf, unreadable: bool) -> Self {
        Self {
            path,
            layer: MemoryLayer::new(),
            dirty: false,
            unreadable,
        }
    }

    fn read_root(path: &Utf8Path) -> Result<LayerNode> {
        let file_contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings layer: {}", path))?;

        if file_contents.trim().is_empty() {
            return Ok(LayerNode::default());
        }

        let document: serde_yaml_ng::Value = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse settings layer: {}", path))?;
        Ok(LayerNode::from_yaml(&document, ""))
    }

    fn backup_unreadable(&mut self) -> Result<(), StoreError> {
        if !self.unreadable {
            return Ok(());
        }
        let backup = self.backup_path();
        if self.path.exists() {
            fs::rename(&self.path, &backup).map_err(|source| StoreError::Io {
                path: backup.clone(),
                source,
            })?;
            tracing::warn!("Moved unreadable settings layer {} to {}", self.path, backup);
        }
        self.unreadable = false;
        Ok(())
    }

    fn mark_dirty<T>(&mut self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if result.is_ok() {
            self.dirty = true;
        }
        result
    }
}

impl LayerSource for YamlFileLayer {
    fn read(&self, node: &str, name: &str) -> Option<SettingValue> {
        self.layer.read(node, name)
    }

    fn child_names(&self, node: &str) -> Vec<String> {
        self.layer.child_names(node)
    }

    fn value_names(&self, node: &str) -> Vec<String> {
        self.layer.value_names(node)
    }

    fn has_node(&self, node: &str) -> bool {
        self.layer.has_node(node)
    }
}

impl WritableLayer for YamlFileLayer {
    fn write(&mut self, node: &str, name: &str, value: SettingValue) -> Result<(), StoreError> {
        let result = self.layer.write(node, name, value);
        self.mark_dirty(result)
    }

    fn delete_value(&mut self, node: &str, name: &str) -> Result<bool, StoreError> {
        let result = self.layer.delete_value(node, name);
        self.mark_dirty(result)
    }

    fn delete_node(&mut self, node: &str) -> Result<bool, StoreError> {
        let result = self.layer.delete_node(node);
        self.mark_dirty(result)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        self.backup_unreadable()?;

        let yaml_string = serde_yaml_ng::to_string(self.layer.root())?;
        fs::write(&self.path, yaml_string).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        self.dirty = false;
        tracing::info!("Saved settings layer to {}", self.path);
        Ok(())
    }
}
